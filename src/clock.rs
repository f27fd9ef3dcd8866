// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Wall-clock reads in the resolution the timed-lock polling loop compares
// against. Windows has no gettimeofday, so the timestamp is derived from the
// 100ns FILETIME tick counter instead.

/// Number of 100ns ticks between 1601-01-01 (FILETIME epoch) and 1970-01-01.
pub const FILETIME_UNIX_EPOCH_OFFSET: u64 = 116_444_736_000_000_000;

const TICKS_PER_SEC: u64 = 10_000_000;

/// A wall-clock timestamp: whole seconds plus microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallClock {
    pub secs: i64,
    pub micros: i64,
}

impl WallClock {
    /// Read the realtime clock.
    #[cfg(unix)]
    pub fn now() -> Self {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
        Self {
            secs: ts.tv_sec as i64,
            micros: ts.tv_nsec as i64 / 1_000,
        }
    }

    /// Read the realtime clock.
    #[cfg(windows)]
    pub fn now() -> Self {
        use windows_sys::Win32::Foundation::FILETIME;
        use windows_sys::Win32::System::SystemInformation::GetSystemTimePreciseAsFileTime;

        let mut ft = FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        };
        unsafe { GetSystemTimePreciseAsFileTime(&mut ft) };
        let ticks = ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64;
        Self::from_file_time(ticks)
    }

    /// Convert a FILETIME tick count into a Unix wall-clock timestamp,
    /// truncating to microseconds. Ticks before the Unix epoch saturate to zero.
    pub fn from_file_time(ticks: u64) -> Self {
        let since_unix = ticks.saturating_sub(FILETIME_UNIX_EPOCH_OFFSET);
        Self {
            secs: (since_unix / TICKS_PER_SEC) as i64,
            micros: ((since_unix % TICKS_PER_SEC) / 10) as i64,
        }
    }

    /// The sub-second part expressed in nanoseconds.
    pub fn subsec_nanos(&self) -> i64 {
        self.micros * 1_000
    }
}
