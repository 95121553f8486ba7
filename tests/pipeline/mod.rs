mod local_source;
mod remote_source;
mod runner;
