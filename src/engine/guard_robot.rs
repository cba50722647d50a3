use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use texting_robots::Robot;

use crate::Config;
use crate::util;

/// Caches robots.txt rules per host.
#[derive(Clone)]
pub struct GuardRobot {
    config: Arc<Config>,
    inner: Arc<Mutex<GuardRobotInner>>,
}

struct GuardRobotInner {
    agent: ureq::Agent,
    robots: HashMap<String, Option<Robot>>,
}

impl GuardRobot {
    pub fn new(config: Arc<Config>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.download_timeout))
            .user_agent(&config.bot_name)
            .build();
        Self {
            config,
            inner: Arc::new(Mutex::new(GuardRobotInner {
                agent,
                robots: HashMap::new(),
            })),
        }
    }

    /// Whether `url` may be fetched. A host seen for the first time has its
    /// robots.txt fetched here, blocking the caller; hosts known up front
    /// should go through [`GuardRobot::prefetch`] instead.
    pub fn is_allowed(&self, url: &str) -> bool {
        if !self.config.robotstxt_obey {
            return true;
        }

        // Robot rules don't apply without a host or an http(s) scheme
        let Some((host, robot_url)) = robot_target(url) else {
            return true;
        };

        let agent = {
            let inner = self.inner.lock().unwrap();
            match inner.robots.get(&host) {
                Some(robot) => return allows(robot, url),
                None => inner.agent.clone(),
            }
        };
        let robot = fetch_robot(&agent, &self.config.bot_name, &robot_url);
        self.store(host, robot, url)
    }

    /// Fetches the rules for `url`'s host on the blocking pool so later
    /// `is_allowed` calls for that host never touch the network.
    pub async fn prefetch(&self, url: &str) {
        if !self.config.robotstxt_obey {
            return;
        }
        let Some((host, robot_url)) = robot_target(url) else {
            return;
        };
        let agent = {
            let inner = self.inner.lock().unwrap();
            if inner.robots.contains_key(&host) {
                return;
            }
            inner.agent.clone()
        };

        let bot_name = self.config.bot_name.clone();
        let robot = tokio::task::spawn_blocking(move || fetch_robot(&agent, &bot_name, &robot_url))
            .await
            .unwrap_or_else(|e| {
                log::warn!("robots.txt fetch for {} failed: {}", host, e);
                None
            });
        self.store(host, robot, url);
    }

    /// Caches `robot` unless another caller got there first, then answers
    /// for `url` from the cached rules.
    fn store(&self, host: String, robot: Option<Robot>, url: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let robot = inner.robots.entry(host).or_insert(robot);
        allows(robot, url)
    }

    /// Stores rules for `host` without fetching them.
    #[cfg(test)]
    fn preload(&self, host: &str, robots_txt: &str) {
        let robot = Robot::new(&self.config.bot_name, robots_txt.as_bytes()).ok();
        self.inner.lock().unwrap().robots.insert(host.to_owned(), robot);
    }
}

fn robot_target(url: &str) -> Option<(String, String)> {
    Some((util::get_host(url)?, util::get_robot_url(url)?))
}

// No robots.txt found means everything is allowed
fn allows(robot: &Option<Robot>, url: &str) -> bool {
    robot.as_ref().map_or(true, |robot| robot.allowed(url))
}

fn fetch_robot(agent: &ureq::Agent, bot_name: &str, robot_url: &str) -> Option<Robot> {
    let text = match agent.get(robot_url).call() {
        Ok(response) => response.into_string().ok()?,
        Err(e) => {
            log::debug!("No robots.txt at {}: {}", robot_url, e);
            return None;
        }
    };
    Robot::new(bot_name, text.as_bytes()).ok()
}
