//! Request parsing (§4.5 step 1, §6): turns one line of text into a
//! [`Request`], and the `config k v [k v ...]` key/value pairs into field
//! writes on a [`Config`].

use camera_core::{CameraError, Config, Result};
use std::collections::HashSet;

/// A query verb (§6, plus the read-only extensions in §8.4). Queries never
/// have side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    SensorWidth,
    SensorHeight,
    XBin,
    YBin,
    XOff,
    YOff,
    Width,
    Height,
    ExposureTime,
    FrameRate,
    State,
    ShmId,
    Ping,
    Debug,
    Roi,
    Temperature,
    FrameCount,
    TimeoutCount,
    RingCapacity,
}

/// One parsed client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Start(Option<u32>),
    Stop,
    Abort,
    Quit,
    Config(Vec<(String, String)>),
    SetDebug(bool),
    Query(Query),
}

/// Parse one request line (`spec.md` §6's line-oriented protocol).
/// Unrecognized verbs and malformed argument lists fail with `Parse`.
pub fn parse(line: &str) -> Result<Request> {
    let mut tokens = line.split_whitespace();
    let verb = tokens
        .next()
        .ok_or_else(|| CameraError::Parse("empty request".into()))?;
    let args: Vec<&str> = tokens.collect();

    match verb {
        "start" => Ok(Request::Start(parse_optional_nbufs(&args)?)),
        "stop" => expect_no_args(verb, &args).map(|()| Request::Stop),
        "abort" => expect_no_args(verb, &args).map(|()| Request::Abort),
        "quit" | "exit" => expect_no_args(verb, &args).map(|()| Request::Quit),
        "config" => parse_config_pairs(&args).map(Request::Config),
        "debug" => parse_debug(&args),
        "sensorwidth" => query(verb, &args, Query::SensorWidth),
        "sensorheight" => query(verb, &args, Query::SensorHeight),
        "xbin" => query(verb, &args, Query::XBin),
        "ybin" => query(verb, &args, Query::YBin),
        "xoff" => query(verb, &args, Query::XOff),
        "yoff" => query(verb, &args, Query::YOff),
        "width" => query(verb, &args, Query::Width),
        "height" => query(verb, &args, Query::Height),
        "exposuretime" => query(verb, &args, Query::ExposureTime),
        "framerate" => query(verb, &args, Query::FrameRate),
        "state" => query(verb, &args, Query::State),
        "shmid" => query(verb, &args, Query::ShmId),
        "ping" => query(verb, &args, Query::Ping),
        "roi" => query(verb, &args, Query::Roi),
        "temperature" => query(verb, &args, Query::Temperature),
        "framecount" => query(verb, &args, Query::FrameCount),
        "timeoutcount" => query(verb, &args, Query::TimeoutCount),
        "ring" => match args.as_slice() {
            ["capacity"] => Ok(Request::Query(Query::RingCapacity)),
            _ => Err(CameraError::Parse(format!(
                "'ring' expects 'ring capacity', got 'ring {}'",
                args.join(" ")
            ))),
        },
        other => Err(CameraError::Parse(format!("unknown verb '{other}'"))),
    }
}

fn expect_no_args(verb: &str, args: &[&str]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CameraError::Parse(format!("'{verb}' takes no arguments")))
    }
}

fn query(verb: &str, args: &[&str], q: Query) -> Result<Request> {
    expect_no_args(verb, args).map(|()| Request::Query(q))
}

fn parse_optional_nbufs(args: &[&str]) -> Result<Option<u32>> {
    match args {
        [] => Ok(None),
        [n] => n
            .parse::<u32>()
            .map(Some)
            .map_err(|_| CameraError::Parse(format!("'start': invalid buffer count '{n}'"))),
        _ => Err(CameraError::Parse("'start' takes at most one argument".into())),
    }
}

fn parse_debug(args: &[&str]) -> Result<Request> {
    match args {
        [] => Ok(Request::Query(Query::Debug)),
        ["on"] => Ok(Request::SetDebug(true)),
        ["off"] => Ok(Request::SetDebug(false)),
        _ => Err(CameraError::Parse(format!(
            "'debug' expects 'on' or 'off', got '{}'",
            args.join(" ")
        ))),
    }
}

fn parse_config_pairs(args: &[&str]) -> Result<Vec<(String, String)>> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(CameraError::Parse(
            "'config' requires one or more key/value pairs".into(),
        ));
    }
    let mut pairs = Vec::with_capacity(args.len() / 2);
    let mut seen = HashSet::new();
    for chunk in args.chunks(2) {
        let key = chunk[0].to_string();
        if !seen.insert(key.clone()) {
            return Err(CameraError::Parse(format!("duplicate config key '{key}'")));
        }
        pairs.push((key, chunk[1].to_string()));
    }
    Ok(pairs)
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value.parse::<u32>().map_err(|_| CameraError::BadValue {
        key: key.into(),
        msg: format!("'{value}' is not a non-negative integer"),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value.parse::<f64>().map_err(|_| CameraError::BadValue {
        key: key.into(),
        msg: format!("'{value}' is not a number"),
    })
}

/// Apply recognized `config` keys (§6) onto a clone of the current mirror,
/// producing the record `camera-reconcile` will validate and apply.
/// Unrecognized keys fail fast, naming the offending key.
pub fn apply_config_pairs(base: &mut Config, pairs: &[(String, String)]) -> Result<()> {
    for (key, value) in pairs {
        match key.as_str() {
            "xbin" => base.x_bin = parse_u32(key, value)?,
            "ybin" => base.y_bin = parse_u32(key, value)?,
            "xoff" => base.roi.x_offset = parse_u32(key, value)?,
            "yoff" => base.roi.y_offset = parse_u32(key, value)?,
            "width" => base.roi.width = parse_u32(key, value)?,
            "height" => base.roi.height = parse_u32(key, value)?,
            "exposuretime" => base.exposure_time_s = parse_f64(key, value)?,
            "framerate" => base.frame_rate_hz = parse_f64(key, value)?,
            other => {
                return Err(CameraError::BadValue {
                    key: other.into(),
                    msg: "not a recognized config key".into(),
                })
            }
        }
    }
    Ok(())
}
