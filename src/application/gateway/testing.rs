//! Gateway doubles for service tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{DeviceCommand, DeviceGateway, GatewayError};

/// Records every command and can be told to fail specific actions.
#[derive(Default)]
pub(crate) struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl RecordingGateway {
    pub(crate) fn fail_action(&self, action: &'static str) {
        self.failing.lock().unwrap().insert(action);
    }

    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn actions_for(&self, device_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| id == device_id)
            .map(|(_, action)| action)
            .collect()
    }
}

#[async_trait]
impl DeviceGateway for RecordingGateway {
    async fn send_command(
        &self,
        device_id: &str,
        command: DeviceCommand,
    ) -> Result<(), GatewayError> {
        let action = command.action();
        self.sent
            .lock()
            .unwrap()
            .push((device_id.to_string(), action.to_string()));
        if self.failing.lock().unwrap().contains(action) {
            return Err(GatewayError::Timeout);
        }
        Ok(())
    }

    fn is_connected(&self, _device_id: &str) -> bool {
        true
    }

    fn connected_count(&self) -> usize {
        0
    }
}
