// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// UTC time source; batch records are stamped through it.
pub trait ClockPort: Send + Sync {
    fn now_utc(&self) -> OffsetDateTime;

    /// RFC 3339 stamp stored as `submitted_at`.
    fn submission_stamp(&self) -> Option<String> {
        self.now_utc().format(&Rfc3339).ok()
    }
}
