// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Lock and semaphore round-trip benchmarks.
//
// Run with:
//   cargo bench --bench lock
//   cargo bench --bench lock --features polled-timedlock
//
// Groups:
//   mutex      : lock/unlock, try_lock/unlock and timed_lock/unlock on an
//                uncontended mutex, private vs attached
//   semaphore  : signal followed by wait, private vs attached
//   attach     : attach plus detach of a shared mutex (init + teardown)

#[cfg(unix)]
mod suite {
    use criterion::{black_box, BenchmarkId, Criterion};
    use shmsync::{Mutex, Semaphore};

    #[repr(C, align(64))]
    struct Page([u8; 4096]);

    fn page() -> Box<Page> {
        Box::new(Page([0; 4096]))
    }

    const MODES: &[&str] = &["private", "shared"];

    fn mutex_for(mode: &str, mem: &mut Page) -> Mutex {
        match mode {
            "private" => Mutex::new().unwrap(),
            _ => unsafe { Mutex::attach(mem.0.as_mut_ptr()) }.unwrap(),
        }
    }

    fn semaphore_for(mode: &str, mem: &mut Page) -> Semaphore {
        match mode {
            "private" => Semaphore::new().unwrap(),
            _ => unsafe { Semaphore::attach(mem.0.as_mut_ptr()) }.unwrap(),
        }
    }

    pub fn bench_mutex(c: &mut Criterion) {
        let mut group = c.benchmark_group("mutex");

        for &mode in MODES {
            let mut mem = page();
            let mtx = mutex_for(mode, &mut mem);

            group.bench_function(BenchmarkId::new("lock_unlock", mode), |b| {
                b.iter(|| {
                    mtx.lock().unwrap();
                    black_box(mtx.unlock()).unwrap();
                });
            });

            group.bench_function(BenchmarkId::new("try_lock_unlock", mode), |b| {
                b.iter(|| {
                    mtx.try_lock().unwrap();
                    black_box(mtx.unlock()).unwrap();
                });
            });

            group.bench_function(BenchmarkId::new("timed_lock_unlock", mode), |b| {
                b.iter(|| {
                    mtx.timed_lock(100).unwrap();
                    black_box(mtx.unlock()).unwrap();
                });
            });

            drop(mtx);
        }

        group.finish();
    }

    pub fn bench_semaphore(c: &mut Criterion) {
        let mut group = c.benchmark_group("semaphore");

        for &mode in MODES {
            let mut mem = page();
            let sem = semaphore_for(mode, &mut mem);

            group.bench_function(BenchmarkId::new("signal_wait", mode), |b| {
                b.iter(|| {
                    sem.signal().unwrap();
                    black_box(sem.wait()).unwrap();
                });
            });

            group.bench_function(BenchmarkId::new("signal_timed_wait", mode), |b| {
                b.iter(|| {
                    sem.signal().unwrap();
                    black_box(sem.timed_wait(100)).unwrap();
                });
            });

            drop(sem);
        }

        group.finish();
    }

    pub fn bench_attach(c: &mut Criterion) {
        let mut group = c.benchmark_group("attach");
        let mut mem = page();
        let addr = mem.0.as_mut_ptr();

        group.bench_function("first_attach_detach", |b| {
            b.iter(|| black_box(unsafe { Mutex::attach(addr) }.unwrap()));
        });

        let keep = unsafe { Mutex::attach(addr) }.unwrap();
        group.bench_function("second_attach_detach", |b| {
            b.iter(|| black_box(unsafe { Mutex::attach(addr) }.unwrap()));
        });
        drop(keep);

        group.finish();
    }
}

#[cfg(unix)]
criterion::criterion_group!(
    benches,
    suite::bench_mutex,
    suite::bench_semaphore,
    suite::bench_attach
);
#[cfg(unix)]
criterion::criterion_main!(benches);

#[cfg(not(unix))]
fn main() {}
