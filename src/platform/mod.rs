// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors

#[cfg(unix)]
pub mod posix;

#[cfg(unix)]
pub mod timedlock;
