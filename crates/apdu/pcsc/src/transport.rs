//! PC/SC transport implementation

use std::{ffi::CString, fmt};

use bytes::Bytes;
use gpcard_apdu_core::{CardTransport, TransportError};
use pcsc::{Card, Context, Disposition, MAX_BUFFER_SIZE, Scope};
use tracing::{debug, warn};

use crate::{config::PcscConfig, error::PcscError};

/// Transport to the card in one named PC/SC reader
pub struct PcscTransport {
    context: Context,
    card: Option<Card>,
    reader_name: CString,
    config: PcscConfig,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PcscTransport {
    /// Connect to the card in `reader_name` with the default configuration
    pub fn connect(reader_name: &str) -> Result<Self, PcscError> {
        Self::connect_with_config(reader_name, PcscConfig::default())
    }

    /// Connect to the card in `reader_name`
    ///
    /// The reader is addressed by its exact PC/SC name; readers are never
    /// enumerated.
    pub fn connect_with_config(reader_name: &str, config: PcscConfig) -> Result<Self, PcscError> {
        let reader = CString::new(reader_name)
            .map_err(|_| PcscError::ReaderNotFound(reader_name.to_string()))?;
        let context = Context::establish(Scope::User)?;

        let mut transport = Self {
            context,
            card: None,
            reader_name: reader,
            config,
        };
        transport.connect_card()?;

        Ok(transport)
    }

    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        match self.context.connect(
            &self.reader_name,
            self.config.share_mode.into(),
            self.config.protocols,
        ) {
            Ok(card) => {
                debug!(reader = self.reader_name(), "Connected to card");
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard) => Err(PcscError::NoCard(self.reader_name().into())),
            Err(pcsc::Error::UnknownReader) => {
                Err(PcscError::ReaderNotFound(self.reader_name().into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// ATR of the connected card
    pub fn atr(&self) -> Result<Vec<u8>, PcscError> {
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| PcscError::NoCard(self.reader_name().into()))?;
        Ok(card.get_attribute_owned(pcsc::Attribute::AtrString)?)
    }

    /// Reader name
    pub fn reader_name(&self) -> &str {
        self.reader_name.to_str().unwrap_or_default()
    }

    fn transmit_command(&mut self, command: &[u8], retry: bool) -> Result<Bytes, PcscError> {
        self.connect_card()?;

        let card = self
            .card
            .as_ref()
            .ok_or_else(|| PcscError::NoCard(self.reader_name().into()))?;

        let mut response_buffer = [0u8; MAX_BUFFER_SIZE];
        match card.transmit(command, &mut response_buffer) {
            Ok(response) => Ok(Bytes::copy_from_slice(response)),
            Err(e @ (pcsc::Error::ResetCard | pcsc::Error::RemovedCard)) => {
                self.card = None;
                if retry && self.config.auto_reconnect && e == pcsc::Error::ResetCard {
                    warn!(reader = self.reader_name(), "Card was reset, reconnecting");
                    self.connect_card()?;
                    return self.transmit_command(command, false);
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl CardTransport for PcscTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.transmit_command(command, true).map_err(TransportError::from)
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        if let Some(card) = self.card.take() {
            if let Err((_, err)) = card.disconnect(Disposition::ResetCard) {
                warn!(error = %err, "Card disconnect failed");
            }
        }

        self.connect_card().map_err(Into::into)
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
