//! Fixed CMA row categories offered when a CA corrects a classification.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CmaCategory {
    pub group: &'static str,
    pub row: u32,
    pub label: &'static str,
}

const fn cat(group: &'static str, row: u32, label: &'static str) -> CmaCategory {
    CmaCategory { group, row, label }
}

pub const CMA_CATEGORIES: &[CmaCategory] = &[
    cat("Income", 1, "Net Sales / Revenue from Operations"),
    cat("Income", 2, "Other Income"),
    cat("Expenses", 10, "Raw Material Consumed"),
    cat("Expenses", 11, "Purchase of Stock-in-Trade"),
    cat("Expenses", 12, "Change in Inventories"),
    cat("Expenses", 13, "Employee Benefits Expense"),
    cat("Expenses", 14, "Finance Costs"),
    cat("Expenses", 15, "Depreciation & Amortisation"),
    cat("Expenses", 16, "Manufacturing Expenses"),
    cat("Expenses", 17, "Administrative Expenses"),
    cat("Expenses", 18, "Selling & Distribution Expenses"),
    cat("Expenses", 19, "Other Operating Expenses"),
    cat("Assets", 30, "Fixed Assets / Tangible Assets"),
    cat("Assets", 31, "Capital WIP"),
    cat("Assets", 32, "Investments"),
    cat("Assets", 33, "Trade Receivables"),
    cat("Assets", 34, "Cash & Cash Equivalents"),
    cat("Assets", 35, "Short-term Loans & Advances"),
    cat("Assets", 36, "Inventories / Stock"),
    cat("Assets", 37, "Other Current Assets"),
    cat("Liabilities", 50, "Share Capital"),
    cat("Liabilities", 51, "Reserves & Surplus"),
    cat("Liabilities", 52, "Long-term Borrowings"),
    cat("Liabilities", 53, "Deferred Tax Liabilities"),
    cat("Liabilities", 54, "Short-term Borrowings"),
    cat("Liabilities", 55, "Trade Payables / Creditors"),
    cat("Liabilities", 56, "Other Current Liabilities"),
    cat("Liabilities", 57, "Provisions"),
    cat("Other", 70, "Miscellaneous / Not Applicable"),
    cat("Other", 71, "Contingent Liabilities"),
];

/// Case-insensitive lookup by label.
pub fn find_category(label: &str) -> Option<&'static CmaCategory> {
    CMA_CATEGORIES
        .iter()
        .find(|c| c.label.eq_ignore_ascii_case(label.trim()))
}

/// Categories of one group, in row order.
pub fn categories_in_group(group: &str) -> impl Iterator<Item = &'static CmaCategory> + '_ {
    CMA_CATEGORIES.iter().filter(move |c| c.group == group)
}
