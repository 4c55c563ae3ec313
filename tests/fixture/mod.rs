mod lifecycle;
mod scratch;
