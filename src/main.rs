fn main() {
    bpmn_lite::cli::run();
}
