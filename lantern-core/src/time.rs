use anyhow::{Result, anyhow, bail, ensure};
use core::fmt;
use logos::{Lexer, Logos};
use std::{str::FromStr, time};

/// Human readable duration, used to parse and print throttling values
/// such as `150ms` or `1s 500ms`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub(crate) struct Duration(std::time::Duration);

impl Duration {
    pub(crate) fn new(dur: std::time::Duration) -> Self {
        Self(dur)
    }

    #[inline]
    pub fn into_duration(self) -> time::Duration {
        self.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <time::Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

impl FromStr for Duration {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::new(s);

        let mut durations = Vec::new();

        while let Some(next) = lex.next() {
            let number: Token = next.map_err(|()| anyhow!("Failed to parse: {s}"))?;

            ensure!(
                number == Token::Value,
                "Expecting duration to starts with number. Cannot parse {s}"
            );
            let number: u64 = lex.slice().parse()?;

            let Some(Ok(measure)) = lex.next() else {
                bail!("Expecting a measure, failed to parse: {s}")
            };
            let duration = match measure {
                Token::MicroSeconds => time::Duration::from_micros(number),
                Token::MilliSeconds => time::Duration::from_millis(number),
                Token::Seconds => time::Duration::from_secs(number),
                Token::Value => bail!("Failed to parse `{s}', expecting a measure."),
            };
            durations.push(duration);
        }

        ensure!(!durations.is_empty(), "Expecting a duration, got an empty string");

        Ok(Self(durations.into_iter().sum()))
    }
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[regex("us|µs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,

    #[regex("[0-9]+")]
    Value,
}

/// Milliseconds of a [`std::time::Duration`] as a float, the unit the
/// simulator computes in.
#[inline]
pub fn as_millis_f64(duration: time::Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Inverse of [`as_millis_f64`]. Negative and non finite values clamp to zero.
#[inline]
pub fn from_millis_f64(ms: f64) -> time::Duration {
    if ms.is_finite() && ms > 0.0 {
        time::Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    } else {
        time::Duration::ZERO
    }
}
