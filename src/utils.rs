// src/utils.rs
use ethers::types::U256;

/// Decimals used by every token the farm lists.
pub const TOKEN_DECIMALS: u8 = 18;

pub fn u256_to_human(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let divisor = U256::exp10(decimals as usize);
    let integer = value / divisor;
    let mut fraction = (value % divisor).to_string();
    let width = decimals as usize;
    while fraction.len() < width {
        fraction.insert(0, '0');
    }
    while fraction.ends_with('0') {
        fraction.pop();
    }
    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}

/// Current wall-clock time in milliseconds since the epoch, 0 if the clock is before it.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
