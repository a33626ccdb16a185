use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    // times before the epoch never come out of the accounts service
    let seconds = time.duration_since(UNIX_EPOCH).map(|since| since.as_secs()).unwrap_or(0);
    seconds.serialize(serializer)
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds: u64 = Deserialize::deserialize(deserializer)?;

    UNIX_EPOCH
        .checked_add(Duration::from_secs(seconds))
        .ok_or_else(|| D::Error::custom(format!("timestamp of {} seconds is out of range", seconds)))
}
