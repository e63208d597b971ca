//! Outbound mail seam
//!
//! The portal only ever sends password reset codes. Delivery is behind a
//! trait so deployments can plug in a real provider; the default
//! implementation writes the message to the log, which is what small
//! single-barangay installs run with.

use async_trait::async_trait;
use tracing::info;

use crate::error::PortalError;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_code(&self, to: &str, code: &str) -> Result<(), PortalError>;
}

/// Logs the reset code instead of delivering it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_reset_code(&self, to: &str, code: &str) -> Result<(), PortalError> {
        info!(to = %to, code = %code, "Password reset code (log delivery)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CaptureMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for CaptureMailer {
        async fn send_reset_code(&self, to: &str, code: &str) -> Result<(), PortalError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), code.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mailer_as_trait_object() {
        let capture = Arc::new(CaptureMailer::default());
        let mailer: Arc<dyn Mailer> = capture.clone();

        mailer.send_reset_code("sec@brgy.ph", "123456").await.unwrap();

        let sent = capture.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("sec@brgy.ph".to_string(), "123456".to_string()));
    }
}
