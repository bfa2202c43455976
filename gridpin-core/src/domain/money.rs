//! Rupee amount formatting

/// Group digits the Indian way: last three, then pairs (`1,00,000`)
pub fn group_indian(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let sign = if amount < 0 { "-" } else { "" };
    if digits.len() <= 3 {
        return format!("{}{}", sign, digits);
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{}{},{}", sign, groups.join(","), tail)
}

/// `₹` followed by the grouped amount
pub fn format_rupees(amount: i64) -> String {
    format!("₹{}", group_indian(amount))
}
