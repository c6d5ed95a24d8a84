pub use anyhow::{anyhow, bail, Context, Result};
pub use log::{debug, error, info, trace, warn};

pub use crate::config::{self, Config};
pub use crate::error::ProtocolError;
pub use crate::omnik;
pub use crate::omnik::information::InformationReply;
pub use crate::omnik::packet::{MessageType, ReplyFrame};
pub use crate::options::Options;
