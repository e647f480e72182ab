use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::hash::HashAlgorithm;
use crate::protocol::{
    Channel, EARLIEST_PROTOCOL_VERSION, LATEST_PROTOCOL_VERSION, Request, Response,
};
use crate::sync::config::SessionConfig;
use crate::sync::unexpected_response;

/// Negotiates the session settings with the source.
///
/// Sends PROTOCOL, TARGET_BLOCK_SIZE and HASH_ALGORITHM in that order and returns `requested`
/// narrowed to what the source accepted.
pub async fn negotiate<R, W>(
    channel: &mut Channel<R, W>,
    requested: &SessionConfig,
) -> SyncResult<SessionConfig>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = requested.clone();

    channel
        .send_request(&Request::Protocol {
            version: requested.protocol_version,
        })
        .await?;
    session.protocol_version = match channel.recv_response().await? {
        Response::Protocol { version }
            if (EARLIEST_PROTOCOL_VERSION..=requested.protocol_version).contains(&version) =>
        {
            version
        }
        Response::Protocol { version } => bail!(
            ErrorKind::UnsupportedProtocolVersion,
            "The source answered with an unsupported protocol version",
            format!(
                "requested {}, received {version}",
                requested.protocol_version
            )
        ),
        other => return Err(unexpected_response("PROTOCOL", &other)),
    };

    channel
        .send_request(&Request::TargetBlockSize {
            bytes: requested.min_block_size,
        })
        .await?;
    session.min_block_size = match channel.recv_response().await? {
        Response::TargetBlockSize { bytes } if bytes > 0 => bytes.min(session.max_block_size),
        Response::TargetBlockSize { bytes } => bail!(
            ErrorKind::ProtocolViolation,
            "The source answered with an invalid target block size",
            format!("{bytes} bytes")
        ),
        other => return Err(unexpected_response("TARGET_BLOCK_SIZE", &other)),
    };

    channel
        .send_request(&Request::HashAlgorithm {
            id: requested.hash_algorithm.wire_id(),
        })
        .await?;
    session.hash_algorithm = match channel.recv_response().await? {
        Response::HashAlgorithm { id } => HashAlgorithm::from_wire_id(id)?,
        other => return Err(unexpected_response("HASH_ALGORITHM", &other)),
    };
    if session.hash_algorithm != requested.hash_algorithm {
        bail!(
            ErrorKind::UnsupportedHashAlgorithm,
            "The source does not support the requested hash algorithm",
            format!(
                "requested {}, received {}",
                requested.hash_algorithm, session.hash_algorithm
            )
        );
    }

    info!(
        protocol_version = session.protocol_version,
        min_block_size = session.min_block_size,
        hash_algorithm = %session.hash_algorithm,
        "negotiated session settings"
    );

    Ok(session)
}

/// Picks the protocol version the source speaks in answer to `requested`.
pub fn accept_protocol_version(requested: u32) -> SyncResult<u32> {
    if requested < EARLIEST_PROTOCOL_VERSION {
        bail!(
            ErrorKind::UnsupportedProtocolVersion,
            "The requested protocol version is no longer supported",
            format!("requested {requested}, earliest supported {EARLIEST_PROTOCOL_VERSION}")
        );
    }

    let accepted = requested.min(LATEST_PROTOCOL_VERSION);
    debug!(requested, accepted, "accepted protocol version");

    Ok(accepted)
}
