fn main() {
    sheetpilot_lib::run()
}
