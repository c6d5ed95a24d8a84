use crate::prelude::*;
use crate::omnik::packet::create_information_request;
use crate::omnik::packet_decoder::MessageStream;

use {
    futures::TryStreamExt,
    net2::TcpStreamExt,
    std::time::Duration,
    tokio::io::{AsyncRead, AsyncWriteExt},
};

const TCP_KEEPALIVE_SECS: u64 = 60;

/// Drains the replies to one information request and decodes the telemetry.
///
/// `serial_number` is the one the request was sent with. A reply carrying a
/// different serial is only logged unless `strict_serial_check` is set.
pub async fn parse_messages<R>(
    serial_number: u32,
    reader: R,
    strict_serial_check: bool,
) -> std::result::Result<InformationReply, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut messages = MessageStream::new(reader);
    let mut info = None;

    while let Some(frame) = messages.try_next().await? {
        if frame.serial_number != serial_number {
            if strict_serial_check {
                return Err(ProtocolError::SerialMismatch(serial_number, frame.serial_number));
            }
            debug!(
                "Replied serial number {} not equal to request {}",
                frame.serial_number, serial_number
            );
        }

        match frame.kind()? {
            MessageType::InformationReply => {
                if info.is_some() {
                    warn!("inverter {}: sent multiple information replies", serial_number);
                }
                info = Some(InformationReply::decode(&frame.payload)?);
            }
            MessageType::String => {
                warn!(
                    "inverter {}: sent text message `{}`",
                    serial_number,
                    String::from_utf8_lossy(&frame.payload).trim()
                );
            }
            MessageType::ErrorString => {
                warn!("inverter {}: sent error message `{:02x?}`", serial_number, frame.payload);
            }
            // only ever sent by us; its payload means nothing as a reply
            MessageType::InformationRequest => {
                return Err(ProtocolError::UnknownMessageType(frame.message_type));
            }
        }
    }

    info.ok_or(ProtocolError::NoInformationReply)
}

#[derive(Clone, Debug)]
pub struct Inverter {
    config: config::Inverter,
    strict_serial_check: bool,
}

impl Inverter {
    pub fn new(config: &Config, inverter: &config::Inverter) -> Self {
        Self {
            config: inverter.clone(),
            strict_serial_check: config.strict_serial_check(),
        }
    }

    pub fn config(&self) -> &config::Inverter {
        &self.config
    }

    /// One request/response exchange. The connection is closed on return,
    /// including when the timeout cuts it short.
    pub async fn fetch(&self) -> Result<InformationReply> {
        let timeout = self.config.request_timeout();

        match tokio::time::timeout(timeout, self.exchange()).await {
            Ok(result) => result,
            Err(_) => bail!(
                "inverter {}: no information reply within {} seconds",
                self.config.serial(),
                timeout.as_secs()
            ),
        }
    }

    async fn exchange(&self) -> Result<InformationReply> {
        let serial = self.config.serial();
        let stream = self.connect().await?;
        let (reader, mut writer) = stream.into_split();

        let request = create_information_request(serial)?;
        debug!("inverter {}: TX {:02x?}", serial, request);

        writer
            .write_all(&request)
            .await
            .with_context(|| format!("inverter {}: failed to write request", serial))?;
        writer
            .flush()
            .await
            .with_context(|| format!("inverter {}: failed to flush socket", serial))?;

        let reply = parse_messages(serial, reader, self.strict_serial_check)
            .await
            .with_context(|| format!("inverter {}: invalid reply", serial))?;

        info!("inverter {}: received information reply", serial);
        Ok(reply)
    }

    async fn connect(&self) -> Result<tokio::net::TcpStream> {
        let serial = self.config.serial();
        info!(
            "inverter {}: connecting to {}:{}",
            serial,
            self.config.host(),
            self.config.port()
        );

        let stream = tokio::net::TcpStream::connect((self.config.host(), self.config.port()))
            .await
            .with_context(|| {
                format!(
                    "inverter {}: failed to connect to {}:{}",
                    serial,
                    self.config.host(),
                    self.config.port()
                )
            })?;

        // Configure TCP socket
        let std_stream = stream.into_std()?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
            warn!("Failed to set TCP keepalive: {}", e);
        }

        let stream = tokio::net::TcpStream::from_std(std_stream)?;

        if self.config.use_tcp_nodelay() {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
        }

        info!("inverter {}: connected!", serial);
        Ok(stream)
    }
}
