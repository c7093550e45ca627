//! Conversions between PostgreSQL's binary wire format and [`CellValue`] /
//! [`SqlParam`].
//!
//! Parameters are converted to whatever Rust type the prepared statement
//! declares for them, so an integer binds as `i32` against an `int4` column
//! and as `Decimal` against a `numeric` one.
//!
//! Result cells decode from any type. Types without a dedicated decoder are
//! rendered from their raw bytes, so a non-null value never comes back as
//! `Null`; only NaN and infinite numbers do.

use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, Kind, ToSql, Type};
use uuid::Uuid;

use super::{hex_bytes, CellValue, SqlParam};

type WireError = Box<dyn Error + Sync + Send>;

/// A parameter ready to hand to tokio-postgres.
pub(super) type BoundParam = Box<dyn ToSql + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

/// SQL `NULL` for a parameter of any type.
#[derive(Debug)]
struct PgNull;

impl ToSql for PgNull {
    fn to_sql(&self, _: &Type, _: &mut BytesMut) -> Result<IsNull, WireError> {
        Ok(IsNull::Yes)
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Convert `param` into the Rust type tokio-postgres expects for `ty`.
///
/// Fails only when the value cannot represent that type, e.g. `70000`
/// for an `int2` or `"abc"` for a `uuid`.
pub(super) fn bind_param(param: &SqlParam, ty: &Type) -> Result<BoundParam, String> {
    if matches!(param, SqlParam::Null) {
        return Ok(Box::new(PgNull));
    }
    let mismatch = || format!("cannot bind {param:?} as {ty}");

    let bound: BoundParam = match *ty {
        Type::BOOL => Box::new(as_bool(param).ok_or_else(mismatch)?),
        Type::INT2 => Box::new(narrow::<i16>(param).ok_or_else(mismatch)?),
        Type::INT4 => Box::new(narrow::<i32>(param).ok_or_else(mismatch)?),
        Type::INT8 => Box::new(as_i64(param).ok_or_else(mismatch)?),
        Type::OID => Box::new(narrow::<u32>(param).ok_or_else(mismatch)?),
        Type::FLOAT4 => Box::new(as_f64(param).ok_or_else(mismatch)? as f32),
        Type::FLOAT8 => Box::new(as_f64(param).ok_or_else(mismatch)?),
        Type::NUMERIC => Box::new(as_decimal(param).ok_or_else(mismatch)?),
        Type::JSON | Type::JSONB => Box::new(as_json(param)),
        Type::DATE => Box::new(
            NaiveDate::parse_from_str(&text_of(param), "%Y-%m-%d").map_err(|_| mismatch())?,
        ),
        Type::TIME => Box::new(NaiveTime::from_str(&text_of(param)).map_err(|_| mismatch())?),
        Type::TIMESTAMP => Box::new(parse_timestamp(&text_of(param)).ok_or_else(mismatch)?),
        Type::TIMESTAMPTZ => Box::new(
            DateTime::parse_from_rfc3339(&text_of(param))
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| mismatch())?,
        ),
        Type::UUID => Box::new(Uuid::parse_str(&text_of(param)).map_err(|_| mismatch())?),
        Type::INET => Box::new(IpAddr::from_str(&text_of(param)).map_err(|_| mismatch())?),
        _ if <String as ToSql>::accepts(ty) => Box::new(text_of(param)),
        _ => return Err(mismatch()),
    };
    Ok(bound)
}

fn as_bool(param: &SqlParam) -> Option<bool> {
    match param {
        SqlParam::Bool(b) => Some(*b),
        SqlParam::Int(i) => Some(*i != 0),
        SqlParam::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "yes" | "on" | "1" => Some(true),
            "f" | "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_i64(param: &SqlParam) -> Option<i64> {
    match param {
        SqlParam::Int(i) => Some(*i),
        SqlParam::Bool(b) => Some(i64::from(*b)),
        SqlParam::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(*f as i64),
        SqlParam::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn narrow<T: TryFrom<i64>>(param: &SqlParam) -> Option<T> {
    as_i64(param).and_then(|i| T::try_from(i).ok())
}

fn as_f64(param: &SqlParam) -> Option<f64> {
    match param {
        SqlParam::Int(i) => Some(*i as f64),
        SqlParam::Float(f) => Some(*f),
        SqlParam::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_decimal(param: &SqlParam) -> Option<Decimal> {
    match param {
        SqlParam::Int(i) => Some(Decimal::from(*i)),
        SqlParam::Float(f) => Decimal::from_f64(*f),
        SqlParam::Text(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn as_json(param: &SqlParam) -> JsonValue {
    match param {
        SqlParam::Null => JsonValue::Null,
        SqlParam::Bool(b) => JsonValue::Bool(*b),
        SqlParam::Int(i) => JsonValue::from(*i),
        SqlParam::Float(f) => JsonValue::from(*f),
        SqlParam::Text(s) => {
            serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))
        }
    }
}

fn text_of(param: &SqlParam) -> String {
    match param {
        SqlParam::Null => String::new(),
        SqlParam::Bool(b) => b.to_string(),
        SqlParam::Int(i) => i.to_string(),
        SqlParam::Float(f) => f.to_string(),
        SqlParam::Text(s) => s.clone(),
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::from_str(s)
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
}

/// A result cell of any PostgreSQL type.
pub(super) struct PgCell(pub CellValue);

impl<'a> FromSql<'a> for PgCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, WireError> {
        Ok(PgCell(decode(ty, raw)))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// Decode one non-null value.
pub(super) fn decode(ty: &Type, raw: &[u8]) -> CellValue {
    let decoded = match ty.kind() {
        Kind::Array(member) => decode_array(member, raw),
        _ => decode_scalar(ty, raw),
    };
    decoded.unwrap_or_else(|_| raw_text(raw))
}

fn decode_scalar(ty: &Type, raw: &[u8]) -> Result<CellValue, WireError> {
    if matches!(*ty, Type::DATE | Type::TIMESTAMP | Type::TIMESTAMPTZ) {
        if let Some(infinite) = infinity(raw) {
            return Ok(infinite);
        }
    }

    Ok(match *ty {
        Type::BOOL => CellValue::Bool(bool::from_sql(ty, raw)?),
        Type::CHAR => CellValue::Int(i8::from_sql(ty, raw)?.into()),
        Type::INT2 => CellValue::Int(i16::from_sql(ty, raw)?.into()),
        Type::INT4 => CellValue::Int(i32::from_sql(ty, raw)?.into()),
        Type::INT8 => CellValue::Int(i64::from_sql(ty, raw)?),
        Type::OID => CellValue::Int(u32::from_sql(ty, raw)?.into()),
        Type::FLOAT4 => CellValue::Float(f32::from_sql(ty, raw)?.into()),
        Type::FLOAT8 => CellValue::Float(f64::from_sql(ty, raw)?),
        Type::NUMERIC => numeric(raw)?,
        Type::BYTEA => CellValue::Text(hex_bytes(raw)),
        Type::DATE => CellValue::Text(NaiveDate::from_sql(ty, raw)?.to_string()),
        Type::TIME => CellValue::Text(NaiveTime::from_sql(ty, raw)?.to_string()),
        Type::TIMESTAMP => CellValue::Text(NaiveDateTime::from_sql(ty, raw)?.to_string()),
        Type::TIMESTAMPTZ => CellValue::Text(DateTime::<Utc>::from_sql(ty, raw)?.to_rfc3339()),
        Type::JSON | Type::JSONB => CellValue::Json(JsonValue::from_sql(ty, raw)?),
        Type::UUID => CellValue::Text(Uuid::from_sql(ty, raw)?.to_string()),
        Type::INET | Type::CIDR => CellValue::Text(inet(raw)?),
        Type::INTERVAL => CellValue::Text(interval(raw)?),
        _ => raw_text(raw),
    })
}

/// Text-format types (text, name, enums, citext, xml) are UTF-8 on the wire.
fn raw_text(raw: &[u8]) -> CellValue {
    match std::str::from_utf8(raw) {
        Ok(s) => CellValue::Text(s.to_string()),
        Err(_) => CellValue::Text(hex_bytes(raw)),
    }
}

fn infinity(raw: &[u8]) -> Option<CellValue> {
    let text = match raw {
        [0x7f, 0xff, 0xff, 0xff] | [0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff] => "infinity",
        [0x80, 0, 0, 0] | [0x80, 0, 0, 0, 0, 0, 0, 0] => "-infinity",
        _ => return None,
    };
    Some(CellValue::Text(text.to_string()))
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.0.len() < n {
            return Err("truncated value".into());
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn i16(&mut self) -> Result<i16, WireError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into()?))
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into()?))
    }

    fn i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into()?))
    }

    fn i64(&mut self) -> Result<i64, WireError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into()?))
    }
}

/// Numerics that fit a `Decimal` come back as floats; wider ones keep every
/// digit as text.
fn numeric(raw: &[u8]) -> Result<CellValue, WireError> {
    let mut r = Reader(raw);
    let ndigits = r.i16()?;
    let weight = r.i16()?;
    let sign = r.u16()?;
    let dscale = r.u16()?;

    match sign {
        NUMERIC_NAN | NUMERIC_PINF | NUMERIC_NINF => return Ok(CellValue::Null),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign {other:#x}").into()),
    }

    let digits = (0..ndigits.max(0))
        .map(|_| r.i16())
        .collect::<Result<Vec<_>, _>>()?;
    let text = numeric_text(&digits, weight, sign == NUMERIC_NEG, dscale);

    Ok(match Decimal::from_str(&text).ok().and_then(|d| d.to_f64()) {
        Some(f) => CellValue::Float(f),
        None => CellValue::Text(text),
    })
}

/// Render base-10000 digit groups the way PostgreSQL prints them.
fn numeric_text(digits: &[i16], weight: i16, negative: bool, dscale: u16) -> String {
    let group = |i: i32| {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i))
            .copied()
            .unwrap_or(0)
    };
    let weight = i32::from(weight);

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                out.push_str(&group(i).to_string());
            } else {
                out.push_str(&format!("{:04}", group(i)));
            }
        }
    }

    if dscale > 0 {
        let scale = usize::from(dscale);
        let mut fraction = String::with_capacity(scale + 4);
        let mut i = weight + 1;
        while fraction.len() < scale {
            fraction.push_str(&format!("{:04}", group(i)));
            i += 1;
        }
        fraction.truncate(scale);
        out.push('.');
        out.push_str(&fraction);
    }
    out
}

fn interval(raw: &[u8]) -> Result<String, WireError> {
    let mut r = Reader(raw);
    let micros = r.i64()?;
    let days = r.i32()?;
    let months = r.i32()?;

    let mut parts = Vec::new();
    for (n, unit) in [(months / 12, "year"), (months % 12, "mon"), (days, "day")] {
        if n != 0 {
            let plural = if n == 1 || n == -1 { "" } else { "s" };
            parts.push(format!("{n} {unit}{plural}"));
        }
    }

    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let fraction = micros % 1_000_000;
        if fraction > 0 {
            time.push('.');
            time.push_str(format!("{fraction:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }
    Ok(parts.join(" "))
}

fn inet(raw: &[u8]) -> Result<String, WireError> {
    let mut r = Reader(raw);
    let family = r.u8()?;
    let bits = r.u8()?;
    let is_cidr = r.u8()? != 0;
    let len = r.u8()?;
    let addr = r.take(usize::from(len))?;

    let (addr, max_bits) = match family {
        PGSQL_AF_INET => (IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(addr)?)), 32),
        PGSQL_AF_INET6 => (IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(addr)?)), 128),
        other => return Err(format!("unknown inet family {other}").into()),
    };

    Ok(if is_cidr || bits != max_bits {
        format!("{addr}/{bits}")
    } else {
        addr.to_string()
    })
}

/// Arrays become JSON arrays, nested once per dimension.
fn decode_array(member: &Type, raw: &[u8]) -> Result<CellValue, WireError> {
    let mut r = Reader(raw);
    let ndim = r.i32()?;
    let _has_nulls = r.i32()?;
    let _element_oid = r.i32()?;

    let mut dims = Vec::new();
    for _ in 0..ndim.max(0) {
        let len = r.i32()?;
        let _lower_bound = r.i32()?;
        dims.push(usize::try_from(len)?);
    }

    let total = if dims.is_empty() { 0 } else { dims.iter().product() };
    let mut elements = Vec::with_capacity(total);
    for _ in 0..total {
        let len = r.i32()?;
        let cell = match usize::try_from(len) {
            Ok(len) => decode(member, r.take(len)?),
            Err(_) => CellValue::Null,
        };
        elements.push(cell.to_json());
    }

    if dims.is_empty() {
        return Ok(CellValue::Json(JsonValue::Array(Vec::new())));
    }
    Ok(CellValue::Json(nest(&dims, &mut elements.into_iter())))
}

fn nest<I: Iterator<Item = JsonValue>>(dims: &[usize], elements: &mut I) -> JsonValue {
    match dims.split_first() {
        Some((&len, [])) => JsonValue::Array(elements.by_ref().take(len).collect()),
        Some((&len, rest)) => JsonValue::Array((0..len).map(|_| nest(rest, elements)).collect()),
        None => JsonValue::Null,
    }
}
