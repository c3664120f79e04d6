pub fn run() {
    print!("{}", phantom_host::shim::SHIM);
}
