const OFFSET: u32 = 33;

pub fn decode(s: &str) -> Option<u32> {
    s.bytes().try_fold(0u32, |acc, b| {
        let digit = (b as u32).checked_sub(OFFSET).filter(|d| *d < 91)?;
        acc.checked_mul(91)?.checked_add(digit)
    })
}

pub fn encode(mut value: u32, width: usize) -> String {
    let mut digits = vec![b'!'; width];
    for slot in digits.iter_mut().rev() {
        *slot = (value % 91 + OFFSET) as u8;
        value /= 91;
    }
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(encode(15_427_503, 4), "5L!!");
        assert_eq!(decode("5L!!"), Some(15_427_503));
        assert_eq!(encode(0, 2), "!!");
        assert_eq!(decode("S]"), Some(4610));
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(decode(" !"), None);
        assert_eq!(decode("~~"), None);
    }
}
