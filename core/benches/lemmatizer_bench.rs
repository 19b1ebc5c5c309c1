use criterion::{criterion_group, criterion_main, Criterion};
use sitesearch_core::Lemmatizer;

const PAGE: &str = "<html><head><title>Кошки</title></head><body>\
    <h1>Домашние кошки и собаки</h1>\
    <p>Кошка спит на диване, а собака охраняет дом. Cats and dogs are popular pets.</p>\
    <a href=\"/more\">Подробнее</a>\
    <p>Кошки ловят мышей, собаки бегают по парку и приносят палку хозяину.</p>\
    </body></html>";

fn bench_lemmatize(c: &mut Criterion) {
    let lemmatizer = Lemmatizer::new().expect("lemmatizer");
    c.bench_function("lemmatize_html_page", |b| b.iter(|| lemmatizer.lemmatize_html(PAGE)));
}

criterion_group!(benches, bench_lemmatize);
criterion_main!(benches);
