use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::ApiResult;

/// A long-running component driven by its own tokio task.
#[async_trait]
pub trait Service: Send {
    async fn start(&mut self) -> ApiResult<()> {
        Ok(())
    }

    async fn run(&mut self) -> ApiResult<()>;

    async fn stop(&mut self) -> ApiResult<()> {
        Ok(())
    }
}

async fn drive(name: &str, svc: &mut (impl Service + ?Sized)) -> ApiResult<()> {
    svc.start().await?;
    log::debug!("[{name}] Service started");
    let res = svc.run().await;
    svc.stop().await?;
    res
}

/// Run `svc` through its full lifecycle on a new task, logging the outcome.
pub fn spawn_service<S>(name: &'static str, mut svc: S) -> JoinHandle<ApiResult<()>>
where
    S: Service + 'static,
{
    tokio::spawn(async move {
        let res = drive(name, &mut svc).await;
        match &res {
            Ok(()) => log::debug!("[{name}] Service stopped"),
            Err(err) => log::error!("[{name}] Service failed: {err}"),
        }
        res
    })
}
