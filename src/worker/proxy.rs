//! Off-task cachemap: a dispatcher that executes [`Message`]s against a
//! [`Cachemap`] and a client that forwards facade calls to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    Cachemap, ExportOptions, ExportResult, HasOptions, ImportOptions, KeyOptions, Metadata,
    SetOptions,
};
use crate::config::CachemapOptions;
use crate::error::{CacheError, Lookup, Result};
use crate::freshness::Freshness;
use crate::worker::{Message, Reply};

/// Pending requests the worker queue holds before callers wait
const WORKER_QUEUE_CAPACITY: usize = 64;

type Request = (Message, oneshot::Sender<Result<Reply>>);

// == Dispatch ==
/// Executes `message` against `cache` and packages the outcome.
///
/// `Create` is acknowledged without side effects since the cachemap already
/// exists. A degraded read reports `null`.
pub async fn dispatch(cache: &Cachemap, message: Message) -> Result<Reply> {
    debug!("Dispatching '{}' message", message.kind());

    let result = match message {
        Message::Create { .. } => Value::Null,
        Message::Get { key, options } => lookup_value(cache.get(&key, options).await?)?,
        Message::Set {
            key,
            value,
            options,
        } => Value::Bool(cache.set(&key, value, options).await?),
        Message::Has { key, options } => lookup_value(cache.has(&key, options).await?)?,
        Message::Delete { key, options } => Value::Bool(cache.delete(&key, options).await?),
        Message::Clear => {
            cache.clear().await?;
            Value::Null
        }
        Message::Size => Value::from(cache.size().await?),
        Message::Entries { keys } => encode(cache.entries(keys.as_deref()).await?)?,
        Message::Export { options } => encode(cache.export(options).await?)?,
        Message::Import { options } => {
            cache.import(options).await?;
            Value::Null
        }
    };

    let (metadata, used_heap_size) = cache.snapshot().await;
    Ok(Reply {
        metadata,
        result,
        used_heap_size,
    })
}

fn lookup_value<T: serde::Serialize>(lookup: Lookup<T>) -> Result<Value> {
    match lookup {
        Lookup::Found(value) => encode(value),
        Lookup::Missing => Ok(Value::Null),
        Lookup::Degraded(err) => {
            warn!("Worker lookup degraded: {}", err);
            Ok(Value::Null)
        }
    }
}

fn encode<T: serde::Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| CacheError::Internal(format!("failed to encode reply: {}", e)))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| CacheError::Internal(format!("malformed worker reply: {}", e)))
}

// == Worker Loop ==
async fn run(mut receiver: mpsc::Receiver<Request>) {
    let mut cache: Option<Cachemap> = None;

    while let Some((message, reply)) = receiver.recv().await {
        let outcome = match cache.as_ref() {
            Some(existing) => dispatch(existing, message).await,
            None => match message {
                Message::Create { options } => match Cachemap::create(options).await {
                    Ok(created) => {
                        let (metadata, used_heap_size) = created.snapshot().await;
                        cache = Some(created);
                        Ok(Reply {
                            metadata,
                            result: Value::Null,
                            used_heap_size,
                        })
                    }
                    Err(err) => Err(err),
                },
                other => Err(CacheError::WorkerUnavailable(format!(
                    "'{}' received before create",
                    other.kind()
                ))),
            },
        };

        if reply.send(outcome).is_err() {
            debug!("Worker caller went away before the reply");
        }
    }

    if let Some(cache) = cache {
        cache.reaper().stop();
    }
    info!("Worker stopped");
}

// == Worker Cachemap ==
/// Cachemap running on its own tokio task, driven over a message channel.
///
/// Mirrors the [`Cachemap`] API. Every reply refreshes a local copy of the
/// ledger and heap usage, readable without a round trip.
pub struct WorkerCachemap {
    sender: mpsc::Sender<Request>,
    task: Mutex<Option<JoinHandle<()>>>,
    terminated: AtomicBool,
    snapshot: RwLock<(Vec<Metadata>, u64)>,
}

impl WorkerCachemap {
    /// Starts a worker task and creates the cachemap inside it.
    pub async fn spawn(options: CachemapOptions) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(WORKER_QUEUE_CAPACITY);
        let task = tokio::spawn(run(receiver));

        let worker = Self {
            sender,
            task: Mutex::new(Some(task)),
            terminated: AtomicBool::new(false),
            snapshot: RwLock::new((Vec::new(), 0)),
        };

        let name = options.name.clone();
        if let Err(err) = worker.request(Message::Create { options }).await {
            worker.terminate();
            return Err(err);
        }

        info!("Worker cachemap '{}' started", name);
        Ok(worker)
    }

    pub async fn get(&self, key: &str, options: KeyOptions) -> Result<Lookup<Value>> {
        let result = self
            .request(Message::Get {
                key: key.to_string(),
                options,
            })
            .await?;
        Ok(into_lookup(result))
    }

    pub async fn set(&self, key: &str, value: Value, options: SetOptions) -> Result<bool> {
        let result = self
            .request(Message::Set {
                key: key.to_string(),
                value,
                options,
            })
            .await?;
        decode(result)
    }

    pub async fn has(&self, key: &str, options: HasOptions) -> Result<Lookup<Freshness>> {
        let result = self
            .request(Message::Has {
                key: key.to_string(),
                options,
            })
            .await?;

        match into_lookup(result) {
            Lookup::Found(value) => decode(value).map(Lookup::Found),
            _ => Ok(Lookup::Missing),
        }
    }

    pub async fn delete(&self, key: &str, options: KeyOptions) -> Result<bool> {
        let result = self
            .request(Message::Delete {
                key: key.to_string(),
                options,
            })
            .await?;
        decode(result)
    }

    pub async fn clear(&self) -> Result<()> {
        self.request(Message::Clear).await.map(|_| ())
    }

    pub async fn size(&self) -> Result<usize> {
        decode(self.request(Message::Size).await?)
    }

    pub async fn entries(&self, keys: Option<&[String]>) -> Result<Vec<(String, Value)>> {
        let keys = keys.map(<[String]>::to_vec);
        decode(self.request(Message::Entries { keys }).await?)
    }

    pub async fn export(&self, options: ExportOptions) -> Result<ExportResult> {
        decode(self.request(Message::Export { options }).await?)
    }

    pub async fn import(&self, options: ImportOptions) -> Result<()> {
        self.request(Message::Import { options }).await.map(|_| ())
    }

    /// Ledger snapshot from the most recent reply.
    pub async fn metadata(&self) -> Vec<Metadata> {
        self.snapshot.read().await.0.clone()
    }

    /// Heap usage from the most recent reply.
    pub async fn used_heap_size(&self) -> u64 {
        self.snapshot.read().await.1
    }

    /// Stops the worker task; later calls fail with
    /// [`CacheError::WorkerUnavailable`].
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            task.abort();
            info!("Worker cachemap terminated");
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    async fn request(&self, message: Message) -> Result<Value> {
        if self.is_terminated() {
            return Err(CacheError::WorkerUnavailable("worker terminated".to_string()));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send((message, reply_tx))
            .await
            .map_err(|_| CacheError::WorkerUnavailable("worker channel closed".to_string()))?;

        let reply = reply_rx
            .await
            .map_err(|_| CacheError::WorkerUnavailable("worker dropped the request".to_string()))??;

        *self.snapshot.write().await = (reply.metadata, reply.used_heap_size);
        Ok(reply.result)
    }
}

impl Drop for WorkerCachemap {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn into_lookup(result: Value) -> Lookup<Value> {
    if result.is_null() {
        Lookup::Missing
    } else {
        Lookup::Found(result)
    }
}
