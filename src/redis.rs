use crate::error::Result;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::sync::Arc;
use tokio::sync::Mutex;

fn session_key(session_id: &str) -> String {
    format!("polls:session:{}", session_id)
}

fn rate_limit_key(scope: &str, subject: &str) -> String {
    format!("polls:rate:{}:{}", scope, subject.to_lowercase())
}

#[derive(Clone)]
pub struct RedisClient {
    manager: Arc<Mutex<ConnectionManager>>,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    // Rate limiting. The window starts with the first attempt.
    pub async fn check_rate_limit(
        &self,
        scope: &str,
        subject: &str,
        limit: u32,
        window_seconds: i64,
    ) -> Result<bool> {
        let mut conn = self.manager.lock().await;
        let key = rate_limit_key(scope, subject);

        let attempts: u32 = conn.incr(&key, 1).await?;
        if attempts == 1 {
            let _: () = conn.expire(&key, window_seconds).await?;
        }

        Ok(attempts <= limit)
    }

    pub async fn reset_rate_limit(&self, scope: &str, subject: &str) -> Result<()> {
        let mut conn = self.manager.lock().await;
        let _: () = conn.del(rate_limit_key(scope, subject)).await?;
        Ok(())
    }

    // Session management
    pub async fn store_session(
        &self,
        session_id: &str,
        user_id: &str,
        ttl_seconds: u64,
    ) -> Result<()> {
        let mut conn = self.manager.lock().await;
        let _: () = conn.set_ex(session_key(session_id), user_id, ttl_seconds).await?;
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<String>> {
        let mut conn = self.manager.lock().await;
        let user_id: Option<String> = conn.get(session_key(session_id)).await?;
        Ok(user_id)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut conn = self.manager.lock().await;
        let _: () = conn.del(session_key(session_id)).await?;
        Ok(())
    }
}
