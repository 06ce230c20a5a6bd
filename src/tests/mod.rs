mod runtime;
mod support;

mod test_local_cache;
