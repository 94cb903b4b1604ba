use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One row of the call dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub attendant: String,
    pub sentiment: String,
    /// Duration text exactly as it appeared in the source.
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub transcript: Option<String>,
}

impl CallRecord {
    pub fn new(
        attendant: impl Into<String>,
        sentiment: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        Self {
            attendant: attendant.into(),
            sentiment: sentiment.into(),
            duration: duration.into(),
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// Parsed call length, or `None` when the duration text is unusable.
    pub fn elapsed(&self) -> Option<Duration> {
        CallDuration::parse(&self.duration).map(CallDuration::as_duration)
    }

    /// Whether the call is strictly longer than `threshold`. Unparseable
    /// durations never qualify.
    pub fn exceeds(&self, threshold: Duration) -> bool {
        matches!(self.elapsed(), Some(d) if d > threshold)
    }
}

/// A non-negative elapsed time parsed from spreadsheet text.
///
/// Accepted forms: `H:MM:SS`, `MM:SS`, either with fractional seconds and an
/// optional `N days ` prefix, or a bare number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallDuration(Duration);

impl CallDuration {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        // Only a `N days` prefix can leave the clock part empty.
        let (days, clock) = split_days(text)?;
        let clock_secs = if clock.is_empty() {
            0.0
        } else if clock.contains(':') {
            parse_clock(clock)?
        } else {
            let secs: f64 = unsigned(clock)?.parse().ok()?;
            if !secs.is_finite() || secs < 0.0 {
                return None;
            }
            secs
        };

        let day_secs = days.checked_mul(86_400)?;
        let clock = Duration::try_from_secs_f64(clock_secs).ok()?;
        Duration::from_secs(day_secs).checked_add(clock).map(Self)
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn as_secs(self) -> u64 {
        self.0.as_secs()
    }
}

impl fmt::Display for CallDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        write!(f, "{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Split a pandas-style `"N days HH:MM:SS"` prefix off the clock part.
fn split_days(text: &str) -> Option<(u64, &str)> {
    let Some(idx) = text.find("day") else {
        return Some((0, text));
    };
    let days: u64 = text[..idx].trim().parse().ok()?;
    let rest = text[idx..]
        .trim_start_matches("days")
        .trim_start_matches("day")
        .trim_start()
        .trim_start_matches(',')
        .trim();
    Some((days, rest))
}

/// `f64::from_str` takes `-0`, which slips past range checks.
fn unsigned(field: &str) -> Option<&str> {
    (!field.starts_with(['-', '+'])).then_some(field)
}

/// Parse `H:MM:SS` or `MM:SS` into seconds.
fn parse_clock(clock: &str) -> Option<f64> {
    let parts: Vec<&str> = clock.split(':').map(str::trim).collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => {
            let m: u64 = m.parse().ok()?;
            if m >= 60 {
                return None;
            }
            (h.parse::<u64>().ok()?, m, *s)
        }
        [m, s] => (0, m.parse::<u64>().ok()?, *s),
        _ => return None,
    };

    let seconds: f64 = unsigned(seconds)?.parse().ok()?;
    if !seconds.is_finite() || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let whole = hours.checked_mul(3600)?.checked_add(minutes.checked_mul(60)?)?;
    Some(whole as f64 + seconds)
}
