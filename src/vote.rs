//! The Votifier vote-notification protocol, versions 1 and 2.
//! <https://github.com/NuVotifier/NuVotifier/wiki/Technical-QA>

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::options::VoteOptions;
use crate::util;
use crate::Error;

const V2_HEADER: u16 = 0x733A;

#[derive(Serialize)]
struct VoteMessage {
    payload: String,
    signature: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VotePayload {
    service_name: String,
    username: String,
    address: String,
    timestamp: i64,
    challenge: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    uuid: String,
}

#[derive(Deserialize)]
struct VoteResponse {
    status: String,
    error: Option<String>,
}

/// Sends a Votifier vote to the server, negotiating the protocol version
/// from the banner the server sends on connect.
///
/// # Errors
///
/// Fails when the negotiated version cannot be satisfied by the supplied
/// options, the public key or token is unusable, or the server reports an
/// error.
pub async fn send_vote(host: &str, port: u16, options: VoteOptions) -> Result<(), Error> {
    let stream = util::timed(options.timeout, TcpStream::connect((host, port))).await?;
    let mut stream = BufReader::new(stream);

    // Handshake banner: `VERSION x.y [challenge]`
    let mut banner = String::new();
    util::timed(options.timeout, stream.read_line(&mut banner)).await?;

    let segments: Vec<&str> = banner.trim_end().split(' ').collect();

    if segments.len() < 2 {
        return Err(Error::UnexpectedResponse(banner.trim_end().to_owned()));
    }

    let version = segments[1];
    let major = version.split('.').next().unwrap_or(version);
    let challenge = segments.get(2).copied().unwrap_or_default().to_owned();

    if options.debug {
        debug!(version, "received Votifier banner");
    }

    if major != "1" && major != "2" {
        return Err(Error::UnknownServerVersion(version.to_owned()));
    }

    if major == "2" && !options.token.is_empty() {
        send_v2_vote(&mut stream, host, port, &challenge, &options).await
    } else if !options.public_key.is_empty() {
        // A server advertising v2 may still accept v1 votes.
        send_v1_vote(&mut stream, &options).await
    } else if major == "2" {
        Err(Error::OptionMissing("token"))
    } else {
        Err(Error::OptionMissing("public_key"))
    }
}

// https://github.com/NuVotifier/NuVotifier/wiki/Technical-QA#protocol-v1-deprecated
async fn send_v1_vote(
    stream: &mut BufReader<TcpStream>,
    options: &VoteOptions,
) -> Result<(), Error> {
    let public_key = decode_public_key(&options.public_key)?;

    let ip_address = if options.ip_address.is_empty() {
        "127.0.0.1"
    } else {
        &options.ip_address
    };

    let payload = format!(
        "VOTE\n{}\n{}\n{}\n{}",
        options.service_name,
        options.username,
        ip_address,
        format_rfc3339(options.timestamp),
    );

    let ciphertext = public_key
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, payload.as_bytes())
        .map_err(|err| {
            Error::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                err.to_string(),
            ))
        })?;

    // Fire and forget; v1 servers send no reply.
    util::timed(options.timeout, async {
        stream.write_all(&ciphertext).await?;
        stream.flush().await
    })
    .await?;

    if options.debug {
        debug!("wrote Votifier 1 vote packet");
    }

    Ok(())
}

// https://github.com/NuVotifier/NuVotifier/wiki/Technical-QA#protocol-v2
async fn send_v2_vote(
    stream: &mut BufReader<TcpStream>,
    host: &str,
    port: u16,
    challenge: &str,
    options: &VoteOptions,
) -> Result<(), Error> {
    let timestamp = i64::try_from(
        options
            .timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or_default();

    let payload = serde_json::to_string(&VotePayload {
        service_name: options.service_name.clone(),
        username: options.username.clone(),
        address: format!("{host}:{port}"),
        timestamp,
        challenge: challenge.to_owned(),
        uuid: options.uuid.clone(),
    })?;

    let mut mac = Hmac::<Sha256>::new_from_slice(options.token.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());

    let message = serde_json::to_vec(&VoteMessage {
        payload,
        signature: BASE64.encode(mac.finalize().into_bytes()),
    })?;

    let mut frame = Vec::with_capacity(4 + message.len());
    frame.extend_from_slice(&V2_HEADER.to_be_bytes());
    frame.extend_from_slice(&u16::try_from(message.len()).unwrap_or(u16::MAX).to_be_bytes());
    frame.extend_from_slice(&message);

    util::timed(options.timeout, async {
        stream.write_all(&frame).await?;
        stream.flush().await
    })
    .await?;

    if options.debug {
        debug!("wrote Votifier 2 vote packet");
    }

    let mut line = String::new();
    util::timed(options.timeout, stream.read_line(&mut line)).await?;

    let response: VoteResponse = serde_json::from_str(line.trim_end())?;

    match response.status.as_str() {
        "ok" => Ok(()),
        "error" => Err(Error::ServerReportedError(
            response.error.unwrap_or_default(),
        )),
        other => Err(Error::UnexpectedResponse(other.to_owned())),
    }
}

/// Decodes an RSA public key given as the base64 body of a PEM document,
/// without the header lines.
fn decode_public_key(body: &str) -> Result<RsaPublicKey, Error> {
    let stripped: String = body.chars().filter(|ch| !ch.is_whitespace()).collect();
    let der = BASE64
        .decode(stripped)
        .map_err(|_| Error::InvalidPublicKey)?;

    RsaPublicKey::from_public_key_der(&der).map_err(|_| Error::InvalidPublicKey)
}

/// Formats a timestamp as an RFC 3339 UTC date-time with second precision.
fn format_rfc3339(time: SystemTime) -> String {
    #[allow(clippy::cast_possible_wrap)]
    let secs = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let days = secs.div_euclid(86400);
    let rem = secs.rem_euclid(86400);
    let (hour, minute, second) = (rem / 3600, (rem / 60) % 60, rem % 60);

    // Civil-from-days conversion over 400-year eras.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}
