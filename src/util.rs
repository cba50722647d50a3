use reqwest::Url;

pub fn get_host(url: &str) -> Option<String> {
    let url_ = Url::parse(url).ok()?;
    url_.host_str().map(|x| x.to_owned())
}

pub fn get_robot_url(url: &str) -> Option<String> {
    let mut url_ = Url::parse(url).ok()?;
    if url_.scheme() != "http" && url_.scheme() != "https" {
        return None;
    }
    url_.set_path("/robots.txt");
    url_.set_query(None);
    url_.set_fragment(None);
    Some(url_.to_string())
}

/// Whether `url` lies outside `domains`. Subdomains count as inside.
pub fn is_offsite(url: &str, domains: &[String]) -> bool {
    let host = match get_host(url) {
        Some(host) => host,
        None => return true,
    };
    !domains.iter().any(|domain| {
        host == *domain || host.ends_with(&format!(".{}", domain))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_url_drops_path_and_query() {
        assert_eq!(
            get_robot_url("https://offervault.com/api/networks?site=offervault"),
            Some("https://offervault.com/robots.txt".to_owned())
        );
        assert_eq!(get_robot_url("ftp://offervault.com/x"), None);
        assert_eq!(get_robot_url("not a url"), None);
    }

    #[test]
    fn host_ignores_port_and_path() {
        assert_eq!(get_host("http://127.0.0.1:8080/_search"), Some("127.0.0.1".to_owned()));
        assert_eq!(get_host("https://www.affplus.com/"), Some("www.affplus.com".to_owned()));
        assert_eq!(get_host("not a url"), None);
    }

    #[test]
    fn offsite_allows_subdomains() {
        let domains = vec!["affplus.com".to_owned()];
        assert!(!is_offsite("https://affplus.com/_search", &domains));
        assert!(!is_offsite("https://www.affplus.com/_search", &domains));
        assert!(is_offsite("https://notaffplus.com/_search", &domains));
        assert!(is_offsite("https://offervault.com/api", &domains));
    }
}
