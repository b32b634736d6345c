use serde_json::{Map, Value};

use crate::types::MediaRef;

/// Animated-media keys, in priority order within a node.
const ANIMATED_KEYS: [&str; 2] = ["gifs", "videos"];
const IMAGE_KEY: &str = "images";

/// Media located in a job's outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMedia {
    pub media_url: Option<String>,
    pub auxiliary_media: Vec<String>,
}

/// Build the `/view` URL for a media reference.
pub fn view_url(api_base: &str, media: &MediaRef) -> String {
    let base = format!("{}/view", api_base.trim_end_matches('/'));
    reqwest::Url::parse_with_params(
        &base,
        &[
            ("filename", media.filename.as_str()),
            ("subfolder", media.subfolder.as_str()),
            ("type", media.media_type.as_str()),
        ],
    )
    .map(String::from)
    .unwrap_or_else(|_| {
        format!(
            "{}?filename={}&subfolder={}&type={}",
            base, media.filename, media.subfolder, media.media_type
        )
    })
}

/// Node ids ordered numerically where possible, so the selection follows
/// the job graph's declaration order rather than the payload's key order.
fn ordered_nodes(outputs: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut nodes: Vec<_> = outputs.iter().collect();
    nodes.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    nodes
}

fn media_list<'a>(node: &'a Value, key: &str) -> impl Iterator<Item = MediaRef> + 'a {
    node.get(key)
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(MediaRef::from_value)
}

/// Locate the animated output and every still image in a job's outputs.
///
/// The first node (in id order) with a non-empty `gifs` list, or failing that
/// a `videos` list, supplies `media_url`. Every `images` entry of every node
/// is collected into `auxiliary_media`. Missing keys contribute nothing.
pub fn extract(api_base: &str, outputs: &Map<String, Value>) -> ExtractedMedia {
    let nodes = ordered_nodes(outputs);

    let media_url = nodes.iter().find_map(|(_, node)| {
        ANIMATED_KEYS
            .iter()
            .find_map(|key| media_list(*node, key).next())
            .map(|media| view_url(api_base, &media))
    });

    let auxiliary_media = nodes
        .iter()
        .flat_map(|(_, node)| media_list(*node, IMAGE_KEY))
        .map(|media| view_url(api_base, &media))
        .collect();

    ExtractedMedia {
        media_url,
        auxiliary_media,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "http://127.0.0.1:8188";

    fn outputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_view_url() {
        let media = MediaRef {
            filename: "dream_loop_00001_.gif".into(),
            subfolder: "".into(),
            media_type: "output".into(),
        };
        assert_eq!(
            view_url(BASE, &media),
            "http://127.0.0.1:8188/view?filename=dream_loop_00001_.gif&subfolder=&type=output"
        );
        assert_eq!(view_url("http://127.0.0.1:8188/", &media), view_url(BASE, &media));
    }

    #[test]
    fn test_extract_gif() {
        let out = outputs(json!({
            "8": {"gifs": [{"filename": "loop.gif", "subfolder": "dreams", "type": "output"}]}
        }));
        let media = extract(BASE, &out);
        assert_eq!(
            media.media_url.as_deref(),
            Some("http://127.0.0.1:8188/view?filename=loop.gif&subfolder=dreams&type=output")
        );
        assert!(media.auxiliary_media.is_empty());
    }

    #[test]
    fn test_gifs_checked_before_videos() {
        let out = outputs(json!({
            "8": {
                "videos": [{"filename": "loop.mp4", "subfolder": "", "type": "output"}],
                "gifs": [{"filename": "loop.gif", "subfolder": "", "type": "output"}]
            }
        }));
        let url = extract(BASE, &out).media_url.unwrap();
        assert!(url.contains("filename=loop.gif"));
    }

    #[test]
    fn test_videos_fallback() {
        let out = outputs(json!({
            "9": {"videos": [{"filename": "loop.mp4", "subfolder": "", "type": "temp"}]}
        }));
        let url = extract(BASE, &out).media_url.unwrap();
        assert!(url.contains("filename=loop.mp4"));
        assert!(url.contains("type=temp"));
    }

    #[test]
    fn test_first_node_wins() {
        let out = outputs(json!({
            "12": {"gifs": [{"filename": "late.gif", "subfolder": "", "type": "output"}]},
            "8": {"gifs": [{"filename": "early.gif", "subfolder": "", "type": "output"}]}
        }));
        let url = extract(BASE, &out).media_url.unwrap();
        assert!(url.contains("filename=early.gif"));
    }

    #[test]
    fn test_no_animated_node() {
        let out = outputs(json!({
            "7": {"images": [{"filename": "a.png", "subfolder": "", "type": "output"}]}
        }));
        let media = extract(BASE, &out);
        assert!(media.media_url.is_none());
        assert_eq!(media.auxiliary_media.len(), 1);
    }

    #[test]
    fn test_images_from_every_node() {
        let out = outputs(json!({
            "7": {"images": [
                {"filename": "a.png", "subfolder": "", "type": "output"},
                {"filename": "b.png", "subfolder": "", "type": "output"}
            ]},
            "9": {"images": [{"filename": "c.png", "subfolder": "", "type": "output"}]}
        }));
        let media = extract(BASE, &out);
        let names: Vec<_> = media
            .auxiliary_media
            .iter()
            .map(|u| u.split("filename=").nth(1).unwrap().split('&').next().unwrap())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_empty_and_unrecognized() {
        assert_eq!(extract(BASE, &Map::new()), ExtractedMedia::default());

        let out = outputs(json!({
            "3": {"latents": [{"filename": "x.latent"}]},
            "4": {"gifs": []},
            "5": {"images": "not a list"}
        }));
        assert_eq!(extract(BASE, &out), ExtractedMedia::default());
    }
}
