//! Business-type inference from member names.

use crate::registry::BusinessType;

/// Keyword table, checked in order; the first hit decides.
const BUSINESS_KEYWORDS: &[(&str, BusinessType)] = &[
    ("wholesale", BusinessType::Wholesale),
    ("distribut", BusinessType::Distributor),
    ("pharma", BusinessType::Pharmacy),
    ("drugstore", BusinessType::Pharmacy),
    ("logistic", BusinessType::Logistics),
    ("transport", BusinessType::Logistics),
    ("carrier", BusinessType::Logistics),
    ("manufactur", BusinessType::Manufacturer),
    ("industr", BusinessType::Manufacturer),
    ("factory", BusinessType::Manufacturer),
    ("retail", BusinessType::Retail),
    ("store", BusinessType::Retail),
    ("market", BusinessType::Retail),
    ("shop", BusinessType::Retail),
];

/// Infers a business type from raw (not normalized) names.
///
/// Sector words are stop words for the normalizer, so inference must read
/// the names before normalization.
///
/// ```
/// use groupscope::{infer_business_type, BusinessType};
///
/// assert_eq!(infer_business_type(["Acme Wholesaler North"]), BusinessType::Wholesale);
/// assert_eq!(infer_business_type(["Acme", "Acme 2"]), BusinessType::General);
/// ```
pub fn infer_business_type<'a, I>(names: I) -> BusinessType
where
    I: IntoIterator<Item = &'a str>,
{
    let text = names
        .into_iter()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    BUSINESS_KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map_or(BusinessType::General, |(_, business_type)| *business_type)
}
