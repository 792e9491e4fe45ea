//! Line-oriented parsing of delimited text into typed records.
//!
//! Each input line is split on `,`, trimmed and lower-cased, then handed to a
//! [`LineParser`]. Every line counts as processed, blank ones included. A
//! line that cannot be parsed is counted as an error and skipped; it never
//! stops the batch. Only an unreadable source aborts a load.

use crate::config::ParserKind;
use crate::error::{Error, ParseError, Result};
use crate::geo::GeoPoint;
use crate::vocabulary::Vocabulary;
use csv::{ByteRecord, StringRecord};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Latitude/longitude value standing for "location unknown" in feature
/// record files.
pub const UNKNOWN_COORDINATE: f64 = -200.0;

/// A point carrying a set of feature ids.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: i64,
    /// `None` when the line had no usable latitude/longitude.
    pub location: Option<GeoPoint>,
    pub features: BTreeSet<u32>,
}

impl FeatureRecord {
    pub fn latitude(&self) -> f64 {
        self.location.map_or(UNKNOWN_COORDINATE, |p| p.lat)
    }

    pub fn longitude(&self) -> f64 {
        self.location.map_or(UNKNOWN_COORDINATE, |p| p.lon)
    }
}

/// What a parser made of one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<R> {
    Record(R),
    /// The record is kept, but part of the line was unusable.
    Degraded(R, ParseError),
    Rejected(ParseError),
}

/// One strategy per record kind.
pub trait LineParser {
    type Record;

    /// Parse the fields of one line. Fields arrive trimmed and lower-cased.
    fn parse(&mut self, fields: &StringRecord) -> Parsed<Self::Record>;

    /// Called instead of [`LineParser::parse`] when the line is not valid
    /// UTF-8; `fields` then carries replacement characters. Rejects the line
    /// unless the parser can use what is left.
    fn parse_lossy(&mut self, _fields: &StringRecord) -> Parsed<Self::Record> {
        Parsed::Rejected(ParseError::Encoding)
    }
}

/// Counters over everything an [`Ingestor`] has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub processed: usize,
    pub errors: usize,
}

impl ParseStats {
    pub fn error_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.errors as f64 / self.processed as f64
        }
    }
}

/// Records of one load together with the counters of that load.
#[derive(Debug, Clone)]
pub struct Loaded<R> {
    pub records: Vec<R>,
    pub stats: ParseStats,
}

/// Field `index`; an empty field counts as missing.
fn field<'a>(fields: &'a StringRecord, index: usize) -> std::result::Result<&'a str, ParseError> {
    fields
        .get(index)
        .filter(|f| !f.is_empty())
        .ok_or(ParseError::MissingField { index })
}

fn parse_id(fields: &StringRecord, index: usize) -> std::result::Result<i64, ParseError> {
    let value = field(fields, index)?;
    value.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
        index,
        value: value.to_string(),
    })
}

/// Parse a latitude (`limit` 90) or longitude (`limit` 180) in degrees.
fn parse_degrees(value: &str, index: usize, limit: f64) -> std::result::Result<f64, ParseError> {
    let parsed = value.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        index,
        value: value.to_string(),
    })?;
    if !parsed.is_finite() || parsed.abs() > limit {
        return Err(ParseError::OutOfRange {
            index,
            value: parsed,
            min: -limit,
            max: limit,
        });
    }
    Ok(parsed)
}

/// Parser for `id,lat,lon` lines (or `id,?,lat,lon` in the training layout).
/// Extra trailing fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointParser {
    lat_field: usize,
}

impl PointParser {
    /// `id,lat,lon,...`, also the layout of medoid files.
    pub fn new() -> Self {
        Self { lat_field: 1 }
    }

    /// `id,<ignored>,lat,lon,...`
    pub fn training() -> Self {
        Self { lat_field: 2 }
    }

    fn try_parse(&self, fields: &StringRecord) -> std::result::Result<GeoPoint, ParseError> {
        let id = parse_id(fields, 0)?;
        let lat = parse_degrees(field(fields, self.lat_field)?, self.lat_field, 90.0)?;
        let lon_field = self.lat_field + 1;
        let lon = parse_degrees(field(fields, lon_field)?, lon_field, 180.0)?;
        Ok(GeoPoint::new(id, lat, lon))
    }
}

impl Default for PointParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser for PointParser {
    type Record = GeoPoint;

    fn parse(&mut self, fields: &StringRecord) -> Parsed<GeoPoint> {
        match self.try_parse(fields) {
            Ok(point) => Parsed::Record(point),
            Err(e) => Parsed::Rejected(e),
        }
    }
}

/// Parser for `id,?,lat,lon,tag1 tag2 ...` lines.
///
/// Missing trailing fields are tolerated. Only an unusable id rejects the
/// line; a bad coordinate still yields a record, with unknown location.
#[derive(Debug, Clone, Default)]
pub struct FeatureRecordParser {
    vocabulary: Vocabulary,
    /// Unknown tokens are dropped instead of interned.
    fixed: bool,
}

impl FeatureRecordParser {
    /// Without feature selection: every token is interned into a growing
    /// vocabulary, readable through [`FeatureRecordParser::vocabulary`].
    pub fn new() -> Self {
        Self::default()
    }

    /// With feature selection: tokens missing from `vocabulary` are dropped.
    pub fn with_vocabulary(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            fixed: true,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn into_vocabulary(self) -> Vocabulary {
        self.vocabulary
    }

    fn coordinate(
        fields: &StringRecord,
        index: usize,
        limit: f64,
    ) -> std::result::Result<Option<f64>, ParseError> {
        match fields.get(index) {
            None | Some("") => Ok(None),
            Some(value) => {
                let parsed = value.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                    index,
                    value: value.to_string(),
                })?;
                if parsed == UNKNOWN_COORDINATE {
                    Ok(None)
                } else {
                    parse_degrees(value, index, limit).map(Some)
                }
            }
        }
    }

    fn location(
        id: i64,
        fields: &StringRecord,
    ) -> std::result::Result<Option<GeoPoint>, ParseError> {
        let lat = Self::coordinate(fields, 2, 90.0)?;
        let lon = Self::coordinate(fields, 3, 180.0)?;
        Ok(lat.zip(lon).map(|(lat, lon)| GeoPoint::new(id, lat, lon)))
    }

    fn features(&mut self, fields: &StringRecord) -> BTreeSet<u32> {
        let tokens = fields
            .get(4)
            .unwrap_or("")
            .split(' ')
            .filter(|t| !t.is_empty());
        if self.fixed {
            tokens.filter_map(|t| self.vocabulary.get(t)).collect()
        } else {
            tokens.map(|t| self.vocabulary.intern(t)).collect()
        }
    }
}

impl LineParser for FeatureRecordParser {
    type Record = FeatureRecord;

    fn parse(&mut self, fields: &StringRecord) -> Parsed<FeatureRecord> {
        let id = match parse_id(fields, 0) {
            Ok(id) => id,
            Err(e) => return Parsed::Rejected(e),
        };
        let features = self.features(fields);
        match Self::location(id, fields) {
            Ok(location) => Parsed::Record(FeatureRecord {
                id,
                location,
                features,
            }),
            Err(e) => Parsed::Degraded(
                FeatureRecord {
                    id,
                    location: None,
                    features,
                },
                e,
            ),
        }
    }

    /// Keeps the record; the id and coordinates must still be readable.
    fn parse_lossy(&mut self, fields: &StringRecord) -> Parsed<FeatureRecord> {
        match self.parse(fields) {
            Parsed::Record(record) | Parsed::Degraded(record, _) => {
                Parsed::Degraded(record, ParseError::Encoding)
            }
            rejected => rejected,
        }
    }
}

/// Drives a [`LineParser`] over lines or whole sources and keeps the
/// processed/error counters.
#[derive(Debug, Clone, Default)]
pub struct Ingestor<P> {
    parser: P,
    stats: ParseStats,
}

impl<P: LineParser> Ingestor<P> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            stats: ParseStats::default(),
        }
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn into_parser(self) -> P {
        self.parser
    }

    /// Parse one raw line. A blank line counts as a rejected line.
    pub fn parse_line(&mut self, line: &str) -> Option<P::Record> {
        let fields: StringRecord = line.split(',').map(|f| f.trim().to_lowercase()).collect();
        let parsed = self.parser.parse(&fields);
        self.tally(parsed)
    }

    fn parse_bytes(&mut self, line: &[u8]) -> Option<P::Record> {
        let mut raw: ByteRecord = line.split(|&b| b == b',').collect();
        raw.trim();
        let parsed = match StringRecord::from_byte_record(raw) {
            Ok(fields) => {
                let fields: StringRecord = fields.iter().map(str::to_lowercase).collect();
                self.parser.parse(&fields)
            }
            Err(e) => {
                let fields: StringRecord = e
                    .into_byte_record()
                    .iter()
                    .map(|f| String::from_utf8_lossy(f).to_lowercase())
                    .collect();
                self.parser.parse_lossy(&fields)
            }
        };
        self.tally(parsed)
    }

    fn tally(&mut self, parsed: Parsed<P::Record>) -> Option<P::Record> {
        self.stats.processed += 1;
        match parsed {
            Parsed::Record(record) => Some(record),
            Parsed::Degraded(record, e) => {
                self.stats.errors += 1;
                tracing::trace!(error = %e, "degraded line");
                Some(record)
            }
            Parsed::Rejected(e) => {
                self.stats.errors += 1;
                tracing::trace!(error = %e, "rejected line");
                None
            }
        }
    }

    /// Parse every line of `reader`, stopping after `limit` processed lines.
    /// Lines end at `\n`; a trailing `\r` is dropped.
    pub fn load<R: Read>(&mut self, reader: R, limit: Option<usize>) -> Result<Vec<P::Record>> {
        let start = self.stats.processed;
        let mut records = Vec::new();

        for line in BufReader::new(reader).split(b'\n') {
            if limit.is_some_and(|n| self.stats.processed - start >= n) {
                break;
            }
            let mut line = line?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(record) = self.parse_bytes(&line) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// [`Ingestor::load`] over a file. Failing to open it is fatal.
    pub fn load_file<Q: AsRef<Path>>(
        &mut self,
        path: Q,
        limit: Option<usize>,
    ) -> Result<Loaded<P::Record>> {
        let file = File::open(&path).map_err(|source| Error::SourceUnreadable {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        let before = self.stats;
        let records = self.load(file, limit)?;
        let stats = ParseStats {
            processed: self.stats.processed - before.processed,
            errors: self.stats.errors - before.errors,
        };

        tracing::info!(
            records = records.len(),
            processed = stats.processed,
            errors = stats.errors,
            limited = limit.is_some_and(|n| stats.processed >= n),
            "loaded {:?}",
            path.as_ref()
        );
        if stats.errors > 0 {
            tracing::warn!(
                "{} of {} lines failed to parse ({:.2}%)",
                stats.errors,
                stats.processed,
                stats.error_rate() * 100.0
            );
        }
        Ok(Loaded { records, stats })
    }
}

/// Load clustering input with the parser chosen by `kind`.
///
/// For [`ParserKind::FeatureRecord`] only records with a known location
/// become points; the others still count as processed.
pub fn load_points<P: AsRef<Path>>(
    path: P,
    kind: ParserKind,
    limit: Option<usize>,
) -> Result<Loaded<GeoPoint>> {
    match kind {
        ParserKind::Point => Ingestor::new(PointParser::new()).load_file(path, limit),
        ParserKind::Training => Ingestor::new(PointParser::training()).load_file(path, limit),
        ParserKind::FeatureRecord => {
            let loaded = Ingestor::new(FeatureRecordParser::new()).load_file(path, limit)?;
            Ok(Loaded {
                records: loaded.records.iter().filter_map(|r| r.location).collect(),
                stats: loaded.stats,
            })
        }
    }
}

/// Load feature records, with feature selection when a vocabulary is given.
pub fn load_feature_records<P: AsRef<Path>>(
    path: P,
    vocabulary: Option<Vocabulary>,
    limit: Option<usize>,
) -> Result<Loaded<FeatureRecord>> {
    let parser = match vocabulary {
        Some(v) => FeatureRecordParser::with_vocabulary(v),
        None => FeatureRecordParser::new(),
    };
    Ingestor::new(parser).load_file(path, limit)
}
