const IMAGE_BASE_URL: &str = "https://images.unsplash.com/photo-1524592093055-d57bd2fe7000";
const IMAGE_PARAMS: &str = "auto=format&fit=crop&q=80&w=800";

/// Builds the card image URL for a watch from its brand and model.
///
/// The keyword goes last, percent-encoded as one component (space is `%20`),
/// after the fixed crop/format/quality parameters.
pub fn image_url_for(brand: &str, model: &str) -> String {
    let keyword = format!("{brand} {model}");
    format!(
        "{IMAGE_BASE_URL}?{IMAGE_PARAMS}&q={}",
        urlencoding::encode(&keyword)
    )
}

pub fn is_derived_image_url(candidate: &str) -> bool {
    candidate
        .strip_prefix(IMAGE_BASE_URL)
        .and_then(|rest| rest.strip_prefix('?'))
        .is_some_and(|query| query.starts_with(IMAGE_PARAMS))
}
