use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::{
    config::RuntimeConfig,
    error::{QueueError, QueueResult},
    model::{JoinOutcome, Member, QueueSummary, QueueView, Reposition, User, UserProfile},
    service::QueueService,
    types::{ChatId, QueueId, UserId},
};

use super::events::QueueEvent;

#[derive(Debug)]
pub enum RuntimeError {
    Queue(QueueError),
    TaskFailed(String),
    ChannelClosed,
}

impl From<QueueError> for RuntimeError {
    fn from(value: QueueError) -> Self {
        Self::Queue(value)
    }
}

pub struct QueueHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<QueueEvent>,
}

impl Clone for QueueHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    RegisterChat {
        chat_id: ChatId,
        chat_name: Option<String>,
        resp: Reply<()>,
    },
    EnsureUser {
        profile: UserProfile,
        resp: Reply<User>,
    },
    Create {
        name: String,
        chat_id: ChatId,
        creator_id: UserId,
        is_admin: bool,
        resp: Reply<QueueId>,
    },
    Join {
        name: String,
        chat_id: ChatId,
        user_id: UserId,
        resp: Reply<JoinOutcome>,
    },
    Leave {
        name: String,
        chat_id: ChatId,
        user_id: UserId,
        resp: Reply<Vec<Member>>,
    },
    Rejoin {
        name: String,
        chat_id: ChatId,
        user_id: UserId,
        resp: Reply<JoinOutcome>,
    },
    Skip {
        name: String,
        chat_id: ChatId,
        user_id: UserId,
        resp: Reply<bool>,
    },
    Delete {
        name: String,
        chat_id: ChatId,
        is_admin: bool,
        resp: Reply<usize>,
    },
    ViewAll {
        chat_id: ChatId,
        resp: Reply<Vec<QueueSummary>>,
    },
    ViewOne {
        name: String,
        chat_id: ChatId,
        resp: Reply<QueueView>,
    },
    SetDisplayName {
        user_id: UserId,
        new_name: String,
        resp: Reply<()>,
    },
    RemoveMember {
        name: String,
        chat_id: ChatId,
        identifier: String,
        is_admin: bool,
        resp: Reply<String>,
    },
    SetMemberPosition {
        name: String,
        chat_id: ChatId,
        identifier: String,
        position: i64,
        is_admin: bool,
        resp: Reply<Reposition>,
    },
    Shutdown {
        resp: Reply<()>,
    },
}

/// Starts the command loop. The service stays usable from other threads
/// through the shared `Arc`; the loop only adds ordering among handle calls
/// and the event stream.
pub fn spawn_queue_runtime(service: Arc<QueueService>, config: RuntimeConfig) -> QueueHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_buffer.max(1));
    let (events_tx, _) = broadcast::channel::<QueueEvent>(config.event_buffer.max(1));

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        info!("queue runtime started");
        while let Some(cmd) = cmd_rx.recv().await {
            let done = handle_command(cmd, &service, &events_tx_loop).await;
            if done {
                break;
            }
        }
        info!("queue runtime stopped");
    });

    QueueHandle { cmd_tx, events_tx }
}

impl QueueHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events_tx.subscribe()
    }

    pub async fn register_chat(
        &self,
        chat_id: ChatId,
        chat_name: Option<String>,
    ) -> Result<(), RuntimeError> {
        self.request(|resp| Command::RegisterChat {
            chat_id,
            chat_name,
            resp,
        })
        .await
    }

    pub async fn ensure_user(&self, profile: UserProfile) -> Result<User, RuntimeError> {
        self.request(|resp| Command::EnsureUser { profile, resp })
            .await
    }

    pub async fn create_queue(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
        creator_id: UserId,
        is_admin: bool,
    ) -> Result<QueueId, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::Create {
            name,
            chat_id,
            creator_id,
            is_admin,
            resp,
        })
        .await
    }

    pub async fn join_queue(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<JoinOutcome, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::Join {
            name,
            chat_id,
            user_id,
            resp,
        })
        .await
    }

    pub async fn leave_queue(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Vec<Member>, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::Leave {
            name,
            chat_id,
            user_id,
            resp,
        })
        .await
    }

    pub async fn rejoin_queue(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<JoinOutcome, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::Rejoin {
            name,
            chat_id,
            user_id,
            resp,
        })
        .await
    }

    pub async fn skip_turn(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<bool, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::Skip {
            name,
            chat_id,
            user_id,
            resp,
        })
        .await
    }

    pub async fn delete_queue(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
        is_admin: bool,
    ) -> Result<usize, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::Delete {
            name,
            chat_id,
            is_admin,
            resp,
        })
        .await
    }

    pub async fn view_all(&self, chat_id: ChatId) -> Result<Vec<QueueSummary>, RuntimeError> {
        self.request(|resp| Command::ViewAll { chat_id, resp })
            .await
    }

    pub async fn view_one(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
    ) -> Result<QueueView, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::ViewOne {
            name,
            chat_id,
            resp,
        })
        .await
    }

    pub async fn set_display_name(
        &self,
        user_id: UserId,
        new_name: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        let new_name = new_name.into();
        self.request(|resp| Command::SetDisplayName {
            user_id,
            new_name,
            resp,
        })
        .await
    }

    pub async fn remove_member(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
        identifier: impl Into<String>,
        is_admin: bool,
    ) -> Result<String, RuntimeError> {
        let (name, identifier) = (name.into(), identifier.into());
        self.request(|resp| Command::RemoveMember {
            name,
            chat_id,
            identifier,
            is_admin,
            resp,
        })
        .await
    }

    pub async fn set_member_position(
        &self,
        name: impl Into<String>,
        chat_id: ChatId,
        identifier: impl Into<String>,
        position: i64,
        is_admin: bool,
    ) -> Result<Reposition, RuntimeError> {
        let (name, identifier) = (name.into(), identifier.into());
        self.request(|resp| Command::SetMemberPosition {
            name,
            chat_id,
            identifier,
            position,
            is_admin,
            resp,
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

async fn handle_command(
    cmd: Command,
    service: &Arc<QueueService>,
    events_tx: &broadcast::Sender<QueueEvent>,
) -> bool {
    match cmd {
        Command::RegisterChat {
            chat_id,
            chat_name,
            resp,
        } => {
            let res = run(service, move |svc| svc.register_chat(chat_id, chat_name.as_deref())).await;
            let _ = resp.send(res);
        }
        Command::EnsureUser { profile, resp } => {
            let res = run(service, move |svc| svc.ensure_user(&profile)).await;
            let _ = resp.send(res);
        }
        Command::Create {
            name,
            chat_id,
            creator_id,
            is_admin,
            resp,
        } => {
            let queue = name.clone();
            let res = run(service, move |svc| {
                svc.create_queue(&name, chat_id, creator_id, is_admin)
            })
            .await;
            if let Ok(queue_id) = &res {
                let _ = events_tx.send(QueueEvent::Created {
                    chat_id,
                    queue,
                    queue_id: *queue_id,
                });
            }
            let _ = resp.send(res);
        }
        Command::Join {
            name,
            chat_id,
            user_id,
            resp,
        } => {
            let queue = name.clone();
            let res = run(service, move |svc| svc.join_queue(&name, chat_id, user_id)).await;
            if let Ok(out) = &res {
                let _ = events_tx.send(QueueEvent::Joined {
                    chat_id,
                    queue,
                    user_id,
                    position: out.position,
                });
            }
            let _ = resp.send(res);
        }
        Command::Leave {
            name,
            chat_id,
            user_id,
            resp,
        } => {
            let queue = name.clone();
            let res = run(service, move |svc| svc.leave_queue(&name, chat_id, user_id)).await;
            if res.is_ok() {
                let _ = events_tx.send(QueueEvent::Left {
                    chat_id,
                    queue,
                    user_id,
                });
            }
            let _ = resp.send(res);
        }
        Command::Rejoin {
            name,
            chat_id,
            user_id,
            resp,
        } => {
            let queue = name.clone();
            let res = run(service, move |svc| svc.rejoin_queue(&name, chat_id, user_id)).await;
            if let Ok(out) = &res {
                let _ = events_tx.send(QueueEvent::MovedToEnd {
                    chat_id,
                    queue,
                    user_id,
                    position: out.position,
                });
            }
            let _ = resp.send(res);
        }
        Command::Skip {
            name,
            chat_id,
            user_id,
            resp,
        } => {
            let queue = name.clone();
            let res = run(service, move |svc| svc.skip_turn(&name, chat_id, user_id)).await;
            if let Ok(true) = &res {
                let _ = events_tx.send(QueueEvent::Skipped {
                    chat_id,
                    queue,
                    user_id,
                });
            }
            let _ = resp.send(res);
        }
        Command::Delete {
            name,
            chat_id,
            is_admin,
            resp,
        } => {
            let queue = name.clone();
            let res = run(service, move |svc| svc.delete_queue(&name, chat_id, is_admin)).await;
            if let Ok(removed) = &res {
                let _ = events_tx.send(QueueEvent::Deleted {
                    chat_id,
                    queue,
                    removed: *removed,
                });
            }
            let _ = resp.send(res);
        }
        Command::ViewAll { chat_id, resp } => {
            let _ = resp.send(run(service, move |svc| svc.view_all(chat_id)).await);
        }
        Command::ViewOne {
            name,
            chat_id,
            resp,
        } => {
            let _ = resp.send(run(service, move |svc| svc.view_one(&name, chat_id)).await);
        }
        Command::SetDisplayName {
            user_id,
            new_name,
            resp,
        } => {
            let res = run(service, move |svc| svc.set_display_name(user_id, &new_name)).await;
            let _ = resp.send(res);
        }
        Command::RemoveMember {
            name,
            chat_id,
            identifier,
            is_admin,
            resp,
        } => {
            let queue = name.clone();
            let res = run(service, move |svc| {
                svc.remove_member(&name, chat_id, &identifier, is_admin)
            })
            .await;
            if let Ok(display_name) = &res {
                let _ = events_tx.send(QueueEvent::Removed {
                    chat_id,
                    queue,
                    display_name: display_name.clone(),
                });
            }
            let _ = resp.send(res);
        }
        Command::SetMemberPosition {
            name,
            chat_id,
            identifier,
            position,
            is_admin,
            resp,
        } => {
            let queue = name.clone();
            let res = run(service, move |svc| {
                svc.set_member_position(&name, chat_id, &identifier, position, is_admin)
            })
            .await;
            if let Ok(moved) = &res {
                if moved.changed() {
                    let _ = events_tx.send(QueueEvent::Repositioned {
                        chat_id,
                        queue,
                        old: moved.old,
                        new: moved.new,
                    });
                }
            }
            let _ = resp.send(res);
        }
        Command::Shutdown { resp } => {
            debug!("queue runtime shutdown requested");
            let _ = resp.send(Ok(()));
            return true;
        }
    }

    false
}

/// Runs one synchronous service call on the blocking pool.
async fn run<T, F>(service: &Arc<QueueService>, f: F) -> Result<T, RuntimeError>
where
    F: FnOnce(&QueueService) -> QueueResult<T> + Send + 'static,
    T: Send + 'static,
{
    let svc = Arc::clone(service);
    tokio::task::spawn_blocking(move || f(&svc))
        .await
        .map_err(|e| RuntimeError::TaskFailed(format!("join error: {e}")))?
        .map_err(RuntimeError::from)
}
