//! Classifier statistics tracking.

use std::time::Instant;

use pyramid_core::Outcome;

/// Get current process memory usage in bytes (RSS - Resident Set Size).
/// Returns None if unable to determine.
#[cfg(target_os = "macos")]
pub fn get_memory_usage() -> Option<u64> {
    use std::mem::MaybeUninit;

    // macOS: use mach APIs
    extern "C" {
        fn mach_task_self() -> u32;
        fn task_info(
            target_task: u32,
            flavor: i32,
            task_info_out: *mut libc::c_void,
            task_info_out_cnt: *mut u32,
        ) -> i32;
    }

    #[repr(C)]
    struct TaskBasicInfo {
        suspend_count: i32,
        virtual_size: u64,
        resident_size: u64,
        user_time: (i32, i32),
        system_time: (i32, i32),
        policy: i32,
    }

    const TASK_BASIC_INFO_64: i32 = 5;
    const TASK_BASIC_INFO_64_COUNT: u32 = 10;

    unsafe {
        let mut info = MaybeUninit::<TaskBasicInfo>::uninit();
        let mut count = TASK_BASIC_INFO_64_COUNT;

        let result = task_info(
            mach_task_self(),
            TASK_BASIC_INFO_64,
            info.as_mut_ptr() as *mut libc::c_void,
            &mut count,
        );

        if result == 0 {
            Some(info.assume_init().resident_size)
        } else {
            None
        }
    }
}

#[cfg(target_os = "linux")]
pub fn get_memory_usage() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub fn get_memory_usage() -> Option<u64> {
    None
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a duration in whole seconds as hh:mm:ss.
fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Statistics collected during classification.
#[derive(Debug, Default)]
pub struct SolverStats {
    /// Positions whose outcome was computed fresh (terminal or from children)
    pub positions_evaluated: u64,

    /// Fingerprint already in the cache
    pub cache_hits: u64,

    /// Color-flipped fingerprint in the cache
    pub flip_hits: u64,

    /// Cache entries added (orbit members, flip images, flip hits)
    pub entries_recorded: u64,

    /// Terminal positions: apex filled, or one reserve exhausted
    pub terminal_apex: u64,
    pub terminal_reserve: u64,

    /// Maximum recursion depth reached
    pub max_depth: u64,

    /// Breakdown of fresh outcomes, in `Outcome::ALL` order
    pub outcomes: [u64; 4],

    /// For rate calculation
    start_time: Option<Instant>,
    last_log_time: Option<Instant>,
    last_log_positions: u64,
}

impl SolverStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            last_log_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Record a freshly evaluated outcome
    pub fn record_outcome(&mut self, outcome: Outcome) {
        self.positions_evaluated += 1;
        let slot = match outcome {
            Outcome::LeftWins => 0,
            Outcome::RightWins => 1,
            Outcome::PreviousWins => 2,
            Outcome::NextWins => 3,
        };
        self.outcomes[slot] += 1;
    }

    /// Get current positions per second
    pub fn positions_per_sec(&self) -> f64 {
        if let Some(start) = self.start_time {
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                return self.positions_evaluated as f64 / elapsed;
            }
        }
        0.0
    }

    /// Check if we should log progress. An interval of 0 never logs.
    pub fn should_log(&self, interval_secs: u64) -> bool {
        if interval_secs == 0 {
            return false;
        }
        match self.last_log_time {
            Some(last) => last.elapsed().as_secs() >= interval_secs,
            None => true,
        }
    }

    /// Log progress and reset log timer
    pub fn log_progress(&mut self, cache_size: usize) {
        let now = Instant::now();
        let elapsed_total = self.start_time.map(|s| s.elapsed().as_secs()).unwrap_or(0);

        // Calculate rate since last log
        let rate = match self.last_log_time {
            Some(last) => {
                let elapsed = last.elapsed().as_secs_f64();
                let positions = self.positions_evaluated - self.last_log_positions;
                if elapsed > 0.0 {
                    positions as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => self.positions_per_sec(),
        };

        let mem_str = get_memory_usage()
            .map(|m| format!(" mem={}", format_bytes(m)))
            .unwrap_or_default();

        println!(
            "[{}] evaluated={} cache={} hits={} flip_hits={} rate={:.0}/s depth={}{}",
            format_clock(elapsed_total),
            self.positions_evaluated,
            cache_size,
            self.cache_hits,
            self.flip_hits,
            rate,
            self.max_depth,
            mem_str,
        );
        println!(
            "           outcomes: CL={} CR={} CP={} CN={} terminals: apex={} reserve={}",
            self.outcomes[0],
            self.outcomes[1],
            self.outcomes[2],
            self.outcomes[3],
            self.terminal_apex,
            self.terminal_reserve,
        );

        self.last_log_time = Some(now);
        self.last_log_positions = self.positions_evaluated;
    }

    /// Print final summary
    pub fn print_summary(&self) {
        println!("Positions evaluated: {}", self.positions_evaluated);
        println!("  - CL: {}", self.outcomes[0]);
        println!("  - CR: {}", self.outcomes[1]);
        println!("  - CP: {}", self.outcomes[2]);
        println!("  - CN: {}", self.outcomes[3]);
        println!("Cache hits: {}", self.cache_hits);
        println!("Flip hits: {}", self.flip_hits);
        println!("Entries recorded: {}", self.entries_recorded);
        println!(
            "Terminal positions: {} (apex {}, reserve {})",
            self.terminal_apex + self.terminal_reserve,
            self.terminal_apex,
            self.terminal_reserve
        );
        println!("Max depth: {}", self.max_depth);

        if let Some(start) = self.start_time {
            println!(
                "Average rate: {:.0} positions/sec",
                self.positions_evaluated as f64 / start.elapsed().as_secs_f64().max(1e-9)
            );
        }
    }
}
