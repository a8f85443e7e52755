//! EngineRestarter port
//! Lets the health loop restart the engine without owning the supervisor

use crate::domain::Result;
use async_trait::async_trait;

#[async_trait]
pub trait EngineRestarter: Send + Sync {
    async fn restart_engine(&self) -> Result<()>;
}
