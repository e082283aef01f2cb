use std::time::{Duration, Instant};

use anyhow::Result;

pub async fn wait_for<T, F>(description: &str, timeout: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Option<T>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(value) = f() {
            return Ok(value);
        }

        if Instant::now() >= deadline {
            anyhow::bail!("timeout waiting for {description}");
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
