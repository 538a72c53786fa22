//! Combine several documents' previews into one page sequence

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::preview::{OutputSet, RenderedPage};

/// Order in which output sets are concatenated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeOrder {
    /// Case-insensitive by output name
    #[default]
    ByName,
    /// Ascending by weight (the size of the original upload)
    BySize,
}

impl fmt::Display for MergeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOrder::ByName => write!(f, "by-name"),
            MergeOrder::BySize => write!(f, "by-size"),
        }
    }
}

impl FromStr for MergeOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "by-name" | "name" => Ok(MergeOrder::ByName),
            "by-size" | "size" => Ok(MergeOrder::BySize),
            other => Err(Error::Config(format!("unknown merge order '{}'", other))),
        }
    }
}

/// One document's output, tagged with the keys it can be ordered by
#[derive(Debug, Clone)]
pub struct NamedOutput {
    pub name: String,
    pub weight: u64,
    pub output: OutputSet,
}

/// Sort named outputs in place; ties keep their encounter order
pub fn sort_outputs(outputs: &mut [NamedOutput], order: MergeOrder) {
    match order {
        MergeOrder::ByName => outputs.sort_by_cached_key(|o| o.name.to_lowercase()),
        MergeOrder::BySize => outputs.sort_by_key(|o| o.weight),
    }
}

/// Concatenate output sets in the declared order
///
/// Pages of each set stay in their own order; the sets themselves are sorted
/// stably by `order`.
pub fn merge_outputs(mut outputs: Vec<NamedOutput>, order: MergeOrder) -> Vec<RenderedPage> {
    sort_outputs(&mut outputs, order);
    outputs
        .into_iter()
        .flat_map(|named| named.output.into_pages())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn named(name: &str, weight: u64, pages: &[u32]) -> NamedOutput {
        let pages = pages
            .iter()
            .map(|&page| RenderedPage {
                page,
                image: RgbImage::new(1, 1),
            })
            .collect();
        NamedOutput {
            name: name.to_string(),
            weight,
            output: OutputSet::from_pages(pages),
        }
    }

    fn order_of(outputs: &[NamedOutput]) -> Vec<&str> {
        outputs.iter().map(|o| o.name.as_str()).collect()
    }

    #[test]
    fn test_by_name_is_case_insensitive() {
        let mut outputs = vec![
            named("b_preview.pdf", 1, &[1]),
            named("A_preview.pdf", 2, &[1]),
            named("c_preview.pdf", 3, &[1]),
        ];
        sort_outputs(&mut outputs, MergeOrder::ByName);
        assert_eq!(
            order_of(&outputs),
            vec!["A_preview.pdf", "b_preview.pdf", "c_preview.pdf"]
        );
    }

    #[test]
    fn test_by_size_is_stable() {
        let mut outputs = vec![
            named("first", 500, &[1]),
            named("second", 100, &[1]),
            named("third", 500, &[1]),
            named("fourth", 100, &[1]),
        ];
        sort_outputs(&mut outputs, MergeOrder::BySize);
        assert_eq!(order_of(&outputs), vec!["second", "fourth", "first", "third"]);
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let outputs = vec![named("b_preview", 10, &[2, 4]), named("a_preview", 20, &[1, 3])];

        let merged = merge_outputs(outputs.clone(), MergeOrder::ByName);
        let pages: Vec<u32> = merged.iter().map(|p| p.page).collect();
        assert_eq!(pages, vec![1, 3, 2, 4]);

        let merged = merge_outputs(outputs, MergeOrder::BySize);
        let pages: Vec<u32> = merged.iter().map(|p| p.page).collect();
        assert_eq!(pages, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_parse_merge_order() {
        assert_eq!("name".parse::<MergeOrder>().unwrap(), MergeOrder::ByName);
        assert_eq!("By-Size".parse::<MergeOrder>().unwrap(), MergeOrder::BySize);
        assert!("largest".parse::<MergeOrder>().is_err());
        assert_eq!(MergeOrder::BySize.to_string(), "by-size");
    }
}
