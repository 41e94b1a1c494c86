// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use time::OffsetDateTime;

use crate::app::ports::ClockPort;

/// Wall clock used when stamping submitted batches.
#[derive(Clone, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    #[test]
    fn submission_stamp_is_parseable_utc() {
        let clock = SystemClock::new();
        let stamp = clock.submission_stamp().unwrap();
        assert!(stamp.ends_with('Z'), "{stamp}");
        let parsed = OffsetDateTime::parse(&stamp, &Rfc3339).unwrap();
        assert!(parsed.offset().is_utc());
        assert!((OffsetDateTime::now_utc() - parsed).whole_seconds().abs() < 60);
    }
}
