//! Parsers for `/proc/stat`, `/proc/meminfo` and `/proc/loadavg`.

use crate::error::ParseError;

use super::cpu::CpuField;

/// Aggregate CPU tick counters from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuTicks {
    fn counters(&self) -> [u64; 10] {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
            self.guest,
            self.guest_nice,
        ]
    }

    /// Sum of all ten counters.
    pub fn total(&self) -> u64 {
        self.counters().iter().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn get(&self, field: CpuField) -> u64 {
        match field {
            CpuField::User => self.user,
            CpuField::Nice => self.nice,
            CpuField::System => self.system,
            CpuField::Idle => self.idle,
            CpuField::IoWait => self.iowait,
            CpuField::HardwareInterrupt => self.irq,
            CpuField::SoftwareInterrupt => self.softirq,
            CpuField::Stolen => self.steal,
        }
    }

    /// True if any counter went backwards relative to `earlier`.
    pub fn regressed_from(&self, earlier: &CpuTicks) -> bool {
        self.counters()
            .iter()
            .zip(earlier.counters().iter())
            .any(|(now, then)| now < then)
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Kernels older than 2.6.33 omit the trailing counters; those read as zero.
pub fn parse_cpu_ticks(content: &str) -> Result<CpuTicks, ParseError> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| ParseError::new("no aggregate cpu line"))?;

    let values = line
        .split_whitespace()
        .skip(1)
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| ParseError::new(format!("invalid cpu counter '{s}'")))
        })
        .collect::<Result<Vec<u64>, _>>()?;

    if values.len() < 4 {
        return Err(ParseError::new(format!(
            "cpu line has {} counters, expected at least 4",
            values.len()
        )));
    }

    let get = |idx: usize| values.get(idx).copied().unwrap_or(0);
    Ok(CpuTicks {
        user: get(0),
        nice: get(1),
        system: get(2),
        idle: get(3),
        iowait: get(4),
        irq: get(5),
        softirq: get(6),
        steal: get(7),
        guest: get(8),
        guest_nice: get(9),
    })
}

/// Memory counters from `/proc/meminfo`, in kB. `None` when the key is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub mem_total: Option<u64>,
    pub mem_free: Option<u64>,
    pub buffers: Option<u64>,
    pub cached: Option<u64>,
    pub swap_total: Option<u64>,
    pub swap_free: Option<u64>,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut info.mem_total,
            "MemFree" => &mut info.mem_free,
            "Buffers" => &mut info.buffers,
            "Cached" => &mut info.cached,
            "SwapTotal" => &mut info.swap_total,
            "SwapFree" => &mut info.swap_free,
            _ => continue,
        };
        let value = rest
            .split_whitespace()
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| ParseError::new(format!("invalid meminfo line '{line}'")))?;
        *slot = Some(value);
    }

    if info.mem_total.is_none() {
        return Err(ParseError::new("meminfo has no MemTotal"));
    }
    Ok(info)
}

/// The three load averages from `/proc/loadavg`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAvg {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

/// Parses `/proc/loadavg` content.
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::new("invalid loadavg format"));
    }

    let parse = |idx: usize, name: &str| -> Result<f64, ParseError> {
        parts[idx]
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| ParseError::new(format!("invalid {name} '{}'", parts[idx])))
    };

    Ok(LoadAvg {
        load1: parse(0, "load1")?,
        load5: parse(1, "load5")?,
        load15: parse(2, "load15")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_ticks() {
        let content = "\
cpu  10 20 30 40 5 1 2 3 0 0
cpu0 5 10 15 20 2 0 1 1 0 0
intr 12345
ctxt 999
";
        let ticks = parse_cpu_ticks(content).unwrap();
        assert_eq!(ticks.user, 10);
        assert_eq!(ticks.nice, 20);
        assert_eq!(ticks.system, 30);
        assert_eq!(ticks.idle, 40);
        assert_eq!(ticks.steal, 3);
        assert_eq!(ticks.total(), 111);
        assert_eq!(ticks.get(CpuField::Idle), 40);
        assert_eq!(ticks.get(CpuField::SoftwareInterrupt), 2);
    }

    #[test]
    fn test_parse_cpu_ticks_old_kernel() {
        let ticks = parse_cpu_ticks("cpu 1 2 3 4\n").unwrap();
        assert_eq!(ticks.total(), 10);
        assert_eq!(ticks.steal, 0);
    }

    #[test]
    fn test_parse_cpu_ticks_rejects_garbage() {
        assert!(parse_cpu_ticks("").is_err());
        assert!(parse_cpu_ticks("cpu0 1 2 3 4\n").is_err());
        assert!(parse_cpu_ticks("cpu 1 2 x 4\n").is_err());
        assert!(parse_cpu_ticks("cpu 1 2\n").is_err());
    }

    #[test]
    fn test_regression_detection() {
        let earlier = parse_cpu_ticks("cpu 10 10 10 10\n").unwrap();
        let later = parse_cpu_ticks("cpu 11 10 12 10\n").unwrap();
        let reset = parse_cpu_ticks("cpu 1 1 1 1\n").unwrap();
        assert!(!later.regressed_from(&earlier));
        assert!(reset.regressed_from(&earlier));
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:         1000 kB
SwapTotal:       4096000 kB
SwapFree:        4000000 kB
";
        let info = parse_meminfo(content).unwrap();
        assert_eq!(info.mem_total, Some(16384000));
        assert_eq!(info.mem_free, Some(8192000));
        assert_eq!(info.buffers, Some(512000));
        assert_eq!(info.cached, Some(2048000));
        assert_eq!(info.swap_total, Some(4096000));
        assert_eq!(info.swap_free, Some(4000000));
    }

    #[test]
    fn test_parse_meminfo_requires_total() {
        assert!(parse_meminfo("MemFree: 100 kB\n").is_err());
        assert!(parse_meminfo("MemTotal: lots kB\n").is_err());
    }

    #[test]
    fn test_parse_loadavg() {
        let load = parse_loadavg("0.15 0.25 0.35 2/500 12345\n").unwrap();
        assert_eq!(load.load1, 0.15);
        assert_eq!(load.load5, 0.25);
        assert_eq!(load.load15, 0.35);
    }

    #[test]
    fn test_parse_loadavg_invalid() {
        assert!(parse_loadavg("0.15 0.25").is_err());
        assert!(parse_loadavg("a b c 1/2 3").is_err());
        assert!(parse_loadavg("-1 0 0 1/2 3").is_err());
    }
}
