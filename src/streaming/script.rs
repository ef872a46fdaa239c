//! Client-side source rewrite script.
//!
//! The player calls `window.overrides["video-map-sources"]` with its list of
//! candidate sources. Blacklisted types are returned untouched; every other
//! source is pointed at the HLS playlist.

use hlscache_common::paths::HLS_MIME_TYPE;
use hlscache_common::Blacklist;

/// Route the script is served from.
pub const OVERRIDE_SCRIPT_ROUTE: &str = "/overrides/video-transcoder.js";

/// Render the override script for a blacklist.
pub fn render_override_script(blacklist: &Blacklist) -> String {
    let mut script = String::from(
        "window.overrides[\"video-map-sources\"] = function(sources){\n    return sources.map(function(source){\n",
    );
    for mime in blacklist.mime_types() {
        script.push_str(&format!(
            "        if(source.type == \"{mime}\"){{ return source; }}\n"
        ));
    }
    script.push_str("        source.src = source.src + \"&transcode=hls\";\n");
    script.push_str(&format!("        source.type = \"{HLS_MIME_TYPE}\";\n"));
    script.push_str("        return source;\n    })\n}\n");
    script
}
