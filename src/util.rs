pub(crate) mod unix_seconds;
