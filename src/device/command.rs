//! Button emulation and acknowledged exchanges.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::client::DeviceLink;
use crate::error::{Error, Result};
use crate::protocol::{Inbound, Request, Subsystem, fields};

// ============================================================================
// PushButton
// ============================================================================

/// Emulated device buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushButton {
    /// Switch to access-point mode.
    AccessPoint,
    /// Switch to station mode.
    Station,
    /// Apply the saved configuration.
    Config,
}

impl PushButton {
    /// Wire name of the button.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AccessPoint => fields::AP_BUTTON,
            Self::Station => fields::STA_BUTTON,
            Self::Config => fields::CONFIG_BUTTON,
        }
    }
}

impl fmt::Display for PushButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DeviceLink - Commands
// ============================================================================

impl DeviceLink {
    /// Presses one or more buttons in a single command.
    ///
    /// Returns the device's ack message.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if `buttons` is empty
    /// - [`Error::DeviceRejected`] if the device answers with an error ack
    /// - [`Error::WaitTimeout`] if no ack arrives in time
    pub async fn push_buttons(&self, buttons: &[PushButton]) -> Result<String> {
        if buttons.is_empty() {
            return Err(Error::protocol("push_buttons needs at least one button"));
        }

        debug!(?buttons, "Pushing buttons");
        let request = Request::push_buttons(buttons.iter().map(PushButton::as_str));
        self.acked(request, self.timing().command_timeout()).await
    }

    /// Resets the device to factory settings.
    ///
    /// The device reboots without acknowledging, so this only confirms the
    /// command was written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the transport is not open.
    pub async fn factory_reset(&self) -> Result<()> {
        info!("Sending factory reset");
        self.send(Request::push_buttons([fields::RESET_FACTORY]))
            .await
    }
}

// ============================================================================
// DeviceLink - Exchanges
// ============================================================================

impl DeviceLink {
    /// Sends a request and turns the next ack into a result.
    pub(crate) async fn acked(&self, request: Request, timeout: Duration) -> Result<String> {
        let reply = self.request(request, Inbound::is_ack, timeout).await?;
        reply
            .ack()
            .ok_or_else(|| Error::protocol("Expected an acknowledgement"))?
            .into_result()
    }

    /// Sends a read and waits for the reply of `subsystem`.
    pub(crate) async fn read_subsystem(
        &self,
        request: Request,
        subsystem: Subsystem,
    ) -> Result<Inbound> {
        self.request(
            request,
            move |message: &Inbound| message.is_read(subsystem),
            self.timing().read_timeout(),
        )
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================
