/// Single polarity event from the eDVS camera.
/// Layout matches the C++ `edvs::Event` struct exactly.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub x: u16,
    pub y: u16,
    pub timestamp: i64,
    pub polarity: i8, // -1 or +1
}

impl Event {
    pub fn new(x: u16, y: u16, timestamp: i64, polarity: i8) -> Self {
        Self {
            x,
            y,
            timestamp,
            polarity,
        }
    }

    /// Polarity as a histogram increment, or `None` if the polarity byte is
    /// neither +1 nor -1.
    pub fn polarity_sign(&self) -> Option<i32> {
        match self.polarity {
            1 => Some(1),
            -1 => Some(-1),
            _ => None,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Copy fields to locals to avoid unaligned references from packed struct
        let x = self.x;
        let y = self.y;
        let ts = self.timestamp;
        let pol = self.polarity;
        write!(f, "{}\t{}\t{}\t{}", x, y, ts, pol)
    }
}
