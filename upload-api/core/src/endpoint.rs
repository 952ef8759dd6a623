/// Returns true if `path` is a discovery endpoint that every caller may read
/// without authorization.
///
/// The `/apis/<group>/<version>` part of the URL space only describes what
/// the server serves; anything at or above it is public. A protected resource
/// path like `/apis/upload.datamover.io/v1beta1/namespaces/default/uploadtokenrequests`
/// splits into more than four segments and is never public unless its fifth
/// segment is the version marker.
pub fn is_info_endpoint(path: &str) -> bool {
    // An empty path carries no evidence of being a discovery endpoint; treat
    // it as protected.
    if path.is_empty() {
        return false;
    }

    let segments: Vec<&str> = path.split('/').collect();
    segments.len() <= 4 || segments[4] == "version"
}
