//! Hierarchical resolution of execution places.

use crate::{LookupKey, Place, ReferenceLookup};

use super::NormalizeError;

const LINE_BREAK: &str = "<BR/>";
const LINE_BREAK_LOWER: &str = "<br/>";
const PLACE_DEPTH: usize = 3;

/// Split a free-text place into at most three trimmed components.
///
/// Components are separated by commas or by an embedded `<BR/>` marker; only
/// the first place is kept when several are listed.
///
/// # Examples
/// ```
/// use procura_core::normalize::split_place;
///
/// assert_eq!(
///     split_place("Portugal, Faro, Castro Marim"),
///     ["Portugal", "Faro", "Castro Marim"]
/// );
/// assert_eq!(split_place("Portugal<BR/>Lisboa"), ["Portugal", "Lisboa"]);
/// ```
#[must_use]
pub fn split_place(raw: &str) -> Vec<&str> {
    raw.split(LINE_BREAK)
        .flat_map(|segment| segment.split(LINE_BREAK_LOWER))
        .flat_map(|segment| segment.split(','))
        .map(str::trim)
        .take(PLACE_DEPTH)
        .collect()
}

/// Resolve a place down the country → district → council hierarchy.
///
/// Each level is looked up only when the level above resolved, scoped by that
/// parent. The first miss, or blank component, leaves the remaining levels
/// empty; misses are never errors.
pub fn resolve_place<L>(raw: Option<&str>, lookups: &L) -> Result<Place, NormalizeError>
where
    L: ReferenceLookup + ?Sized,
{
    let mut place = Place::default();
    let Some(raw) = raw else {
        return Ok(place);
    };
    let mut components = split_place(raw).into_iter();

    let Some(name) = components.next().filter(|name| !name.is_empty()) else {
        return Ok(place);
    };
    let Some(country) = lookups.lookup(&LookupKey::Country { name })? else {
        return Ok(place);
    };
    place.country = Some(country);

    let Some(name) = components.next().filter(|name| !name.is_empty()) else {
        return Ok(place);
    };
    let Some(district) = lookups.lookup(&LookupKey::District { country, name })? else {
        return Ok(place);
    };
    place.district = Some(district);

    let Some(name) = components.next().filter(|name| !name.is_empty()) else {
        return Ok(place);
    };
    place.council = lookups.lookup(&LookupKey::Council { district, name })?;
    Ok(place)
}
