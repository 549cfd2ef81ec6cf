//! Upstream ephemeris feed: HTTP fetch plus a hand-rolled extractor for the
//! CCSDS OEM XML that NASA publishes for the ISS. Only the `<stateVector>`
//! blocks are of interest; the rest of the envelope is ignored. Scalar
//! values stay raw strings here — numeric validation is the query engine's
//! job, so a feed row with a mangled number still lands in the store and
//! remains retrievable by key.

use nom::{
    bytes::complete::{tag, take_until, take_while},
    character::complete::char,
    IResult,
};
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::model::{EpochRecord, ScalarSample};

/// Default upstream source (NASA public OEM ephemeris for the ISS).
pub const DEFAULT_FEED_URL: &str =
    "https://nasa-public-data.s3.amazonaws.com/iss-coords/current/ISS_OEM/ISS.OEM_J2K_EPH.xml";

/// GET the raw feed body. Non-2xx is an upstream failure, not a parse one.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<String, IngestError> {
    debug!(url, "fetching upstream ephemeris");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| IngestError::Upstream(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::Upstream(format!("HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| IngestError::Upstream(e.to_string()))
}

// --- XML ELEMENT PARSERS ---

/// Skip ahead to `<name ...>text</name>` and return (remaining, attrs, text).
fn element<'a>(input: &'a str, name: &str) -> IResult<&'a str, (&'a str, &'a str)> {
    let open = format!("<{name}");
    let close = format!("</{name}>");

    let (input, _) = take_until(open.as_str())(input)?;
    let (input, _) = tag(open.as_str())(input)?;
    let (input, attrs) = take_while(|c| c != '>')(input)?;
    let (input, _) = char('>')(input)?;
    let (input, text) = take_until(close.as_str())(input)?;
    let (input, _) = tag(close.as_str())(input)?;

    Ok((input, (attrs, text.trim())))
}

/// Pull the `units="..."` attribute value out of a raw attribute string.
fn units_of(attrs: &str) -> String {
    attrs
        .split("units=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap_or("")
        .to_string()
}

fn scalar_element<'a>(input: &'a str, name: &str) -> IResult<&'a str, ScalarSample> {
    let (input, (attrs, text)) = element(input, name)?;
    Ok((input, ScalarSample::new(text, &units_of(attrs))))
}

/// One `<stateVector>` block. The CCSDS layout is positional:
/// EPOCH, X, Y, Z, X_DOT, Y_DOT, Z_DOT.
fn state_vector(input: &str) -> IResult<&str, EpochRecord> {
    let (input, _) = take_until("<stateVector>")(input)?;
    let (input, _) = tag("<stateVector>")(input)?;
    let (input, block) = take_until("</stateVector>")(input)?;
    let (input, _) = tag("</stateVector>")(input)?;

    let (block, (_, epoch)) = element(block, "EPOCH")?;
    let (block, x) = scalar_element(block, "X")?;
    let (block, y) = scalar_element(block, "Y")?;
    let (block, z) = scalar_element(block, "Z")?;
    let (block, x_dot) = scalar_element(block, "X_DOT")?;
    let (block, y_dot) = scalar_element(block, "Y_DOT")?;
    let (_, z_dot) = scalar_element(block, "Z_DOT")?;

    Ok((
        input,
        EpochRecord {
            epoch: epoch.to_string(),
            x,
            y,
            z,
            x_dot,
            y_dot,
            z_dot,
        },
    ))
}

/// Extract every state vector from the feed body.
///
/// A payload without a single well-formed block aborts with a malformed-feed
/// error; the store is never partially populated with a corrupt subset that
/// gets silently treated as success.
pub fn parse_feed(xml: &str) -> Result<Vec<EpochRecord>, IngestError> {
    if !xml.contains("<stateVector>") {
        return Err(IngestError::MalformedFeed(
            "no stateVector elements in payload".to_string(),
        ));
    }

    let mut records = Vec::new();
    let mut rest = xml;

    loop {
        match state_vector(rest) {
            Ok((next, record)) => {
                records.push(record);
                rest = next;
            }
            Err(_) => break,
        }
    }

    // Blocks remained but none parsed cleanly: broken nesting, not "empty".
    if records.is_empty() {
        return Err(IngestError::MalformedFeed(
            "stateVector elements present but none parsed".to_string(),
        ));
    }

    if rest.contains("<stateVector>") {
        warn!("trailing unparseable stateVector content after {} records", records.len());
    }

    debug!(count = records.len(), "parsed state vectors from feed");
    Ok(records)
}
