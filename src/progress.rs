use std::io::{self, Write};

/// Observer for long-running pair computations.
///
/// Injected into the dispatcher so observability is an explicit object
/// rather than ambient global state.
pub trait ProgressObserver: Send {
    fn start(&mut self, total: usize);
    fn update(&mut self, done: usize);
    fn finish(&mut self);
}

/// No-op observer for library callers and tests.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn start(&mut self, _total: usize) {}
    fn update(&mut self, _done: usize) {}
    fn finish(&mut self) {}
}

/// Terminal progress display with a description prefix.
pub struct DescriptiveProgress {
    total: usize,
    current: usize,
    description: String,
    last_percentage: usize,
}

impl DescriptiveProgress {
    pub fn new(description: &str) -> Self {
        Self {
            total: 0,
            current: 0,
            description: description.to_string(),
            last_percentage: usize::MAX,
        }
    }

    fn display(&self) -> io::Result<()> {
        let percentage = if self.total > 0 {
            (self.current * 100) / self.total
        } else {
            0
        };
        print!(
            "\r{}: {}/{} ({}%)",
            self.description, self.current, self.total, percentage
        );
        io::stdout().flush()
    }
}

impl ProgressObserver for DescriptiveProgress {
    fn start(&mut self, total: usize) {
        self.total = total;
        self.current = 0;
        self.last_percentage = usize::MAX;
    }

    fn update(&mut self, done: usize) {
        self.current = done;
        let percentage = if self.total > 0 {
            (done * 100) / self.total
        } else {
            0
        };
        // Only redraw when the percentage changes
        if percentage != self.last_percentage {
            let _ = self.display();
            self.last_percentage = percentage;
        }
    }

    fn finish(&mut self) {
        self.current = self.total;
        let _ = self.display();
        println!();
    }
}

/// Format time as "xx h xx m xx.xxx s" format
pub fn format_time_used(elapsed: std::time::Duration) -> String {
    let total_secs = elapsed.as_secs_f64();
    let hours = (total_secs / 3600.0) as u64;
    let minutes = ((total_secs % 3600.0) / 60.0) as u64;
    let seconds = total_secs % 60.0;

    if hours > 0 {
        format!("[Time used] {:02} h {:02} m {:05.3} s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("[Time used] {:02} m {:05.3} s", minutes, seconds)
    } else {
        format!("[Time used] {:05.3} s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_time_used() {
        assert_eq!(format_time_used(Duration::from_millis(1500)), "[Time used] 1.500 s");
        assert_eq!(
            format_time_used(Duration::from_secs(61)),
            "[Time used] 01 m 1.000 s"
        );
        assert_eq!(
            format_time_used(Duration::from_secs(3661)),
            "[Time used] 01 h 01 m 1.000 s"
        );
    }
}
