//! Share links
//!
//! A share link is the base page with a single `room` query parameter. The password
//! is never part of it and has to travel out of band.

use meshroom_core::{MeshroomError, RoomId};
use url::Url;

use crate::error::Result;

const ROOM_PARAM: &str = "room";

pub fn build_share_link(base: &str, room_id: &RoomId) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair(ROOM_PARAM, room_id.as_str());
    Ok(url)
}

/// Room id carried by a share link, if any
pub fn parse_share_link(link: &str) -> Result<Option<RoomId>> {
    let url = Url::parse(link)?;
    let Some((_, value)) = url.query_pairs().find(|(key, _)| key == ROOM_PARAM) else {
        return Ok(None);
    };
    let room_id = value
        .parse::<RoomId>()
        .map_err(|_| MeshroomError::invalid_link(format!("bad room parameter {:?}", value)))?;
    Ok(Some(room_id))
}
