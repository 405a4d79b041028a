use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{Column, Field};
use crate::pipeline::batch::Batch;

/// Matches a parenthesized remark, ASCII or full-width, up to the first closing parenthesis
static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(（][^)）]*[)）]").expect("parenthesis pattern is valid"));

/// Common abbreviations mapped to the full school name
static NAME_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("北大", "北京大学"),
        ("清华", "清华大学"),
        ("复旦", "复旦大学"),
        ("上交", "上海交通大学"),
        ("浙大", "浙江大学"),
        ("南大", "南京大学"),
        ("中大", "中山大学"),
        ("华科", "华中科技大学"),
        ("武大", "武汉大学"),
        ("川大", "四川大学"),
    ])
});

/// Province names with their administrative suffix mapped to the short form
static PROVINCE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("北京市", "北京"),
        ("天津市", "天津"),
        ("上海市", "上海"),
        ("重庆市", "重庆"),
        ("河北省", "河北"),
        ("山西省", "山西"),
        ("辽宁省", "辽宁"),
        ("吉林省", "吉林"),
        ("黑龙江省", "黑龙江"),
        ("江苏省", "江苏"),
        ("浙江省", "浙江"),
        ("安徽省", "安徽"),
        ("福建省", "福建"),
        ("江西省", "江西"),
        ("山东省", "山东"),
        ("河南省", "河南"),
        ("湖北省", "湖北"),
        ("湖南省", "湖南"),
        ("广东省", "广东"),
        ("海南省", "海南"),
        ("四川省", "四川"),
        ("贵州省", "贵州"),
        ("云南省", "云南"),
        ("陕西省", "陕西"),
        ("甘肃省", "甘肃"),
        ("青海省", "青海"),
        ("内蒙古自治区", "内蒙古"),
        ("广西壮族自治区", "广西"),
        ("西藏自治区", "西藏"),
        ("宁夏回族自治区", "宁夏"),
        ("新疆维吾尔自治区", "新疆"),
    ])
});

/// Standardize a single school or major name.
///
/// Strips parenthesized remarks, trims whitespace and expands known
/// abbreviations. The output never contains a parenthesized remark or a
/// listed abbreviation, so applying it twice is the same as applying it once.
pub fn standardize_name(name: &str) -> String {
    let stripped = PARENTHESIZED.replace_all(name, "");
    let trimmed = stripped.trim();
    NAME_ALIASES
        .get(trimmed)
        .map(|full| full.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Map a province label to its short form; unknown labels pass through
pub fn normalize_province_name(province: &str) -> String {
    PROVINCE_NAMES
        .get(province)
        .map(|short| short.to_string())
        .unwrap_or_else(|| province.to_string())
}

/// Rewrite a text column of every row with [`standardize_name`].
///
/// Returns the number of cells whose value changed. Missing and sentinel
/// cells are left alone. Non-text columns are a no-op.
pub fn standardize(batch: &mut Batch, column: Column) -> usize {
    info!("Standardizing column: {}", column.name());
    let changed = rewrite_column(batch, column, standardize_name);
    info!("Column {} standardized, {} values changed", column.name(), changed);
    changed
}

/// Rewrite the province column with [`normalize_province_name`]
pub fn normalize_province(batch: &mut Batch) -> usize {
    let changed = rewrite_column(batch, Column::Province, normalize_province_name);
    info!("Province names cleaned, {} values changed", changed);
    changed
}

fn rewrite_column(batch: &mut Batch, column: Column, rewrite: impl Fn(&str) -> String) -> usize {
    let mut changed = 0;
    for row in batch.rows.iter_mut() {
        let Some(Field::Present(value)) = row.text_mut(column) else {
            continue;
        };
        let rewritten = rewrite(value);
        if rewritten != *value {
            debug!("{}: '{}' -> '{}'", column.name(), value, rewritten);
            *value = rewritten;
            changed += 1;
        }
    }
    changed
}
