use crate::{
    config::WLAN_MAX_KNOWN_NETWORKS,
    profile::{NetworkProfile, Role, Security},
    WlanError, WlanResult,
};

/// The bounded collection of known network profiles.
///
/// Profiles keep their insertion order, so indices stay stable until a profile is removed.
#[derive(Clone, Debug)]
pub(crate) struct ProfileStore {
    networks: heapless::Vec<NetworkProfile, WLAN_MAX_KNOWN_NETWORKS>,
}
impl ProfileStore {
    pub const fn new() -> Self {
        Self {
            networks: heapless::Vec::new(),
        }
    }
    /// Add a copy of the profile.
    ///
    /// If `enterprise_only` is set, station profiles must use WPA2-Enterprise.
    pub fn add(&mut self, profile: &NetworkProfile, enterprise_only: bool) -> WlanResult<()> {
        profile.validate()?;
        if enterprise_only
            && profile.role == Role::Station
            && !matches!(profile.security, Security::Wpa2Enterprise(_))
        {
            return Err(WlanError::InvalidArgument);
        }
        if self.get_by_name(&profile.name).is_some() {
            return Err(WlanError::InvalidArgument);
        }
        self.networks
            .push(profile.clone())
            .map_err(|_| WlanError::NoMemory)
    }
    /// Remove the profile with this name and return it.
    pub fn remove(&mut self, name: &str) -> WlanResult<NetworkProfile> {
        let index = self
            .networks
            .iter()
            .position(|profile| profile.name.as_str() == name)
            .ok_or(WlanError::InvalidArgument)?;
        Ok(self.networks.remove(index))
    }
    pub fn get(&self, index: usize) -> Option<&NetworkProfile> {
        self.networks.get(index)
    }
    pub fn get_by_name(&self, name: &str) -> Option<&NetworkProfile> {
        self.networks
            .iter()
            .find(|profile| profile.name.as_str() == name)
    }
    pub fn count(&self) -> usize {
        self.networks.len()
    }
}
